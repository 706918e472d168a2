//! Continent codes, the raw region table, and discovery of which continents
//! have reach data in a source directory.

use crate::CombineError;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Dataset name whose fragments mark a continent as present.
pub const REACHES_DATASET: &str = "reaches";

/// Trailing tokens that look like continent suffixes but are not.
const DISCOVERY_ARTIFACTS: [&str; 2] = ["interest", REACHES_DATASET];

/// Variant order is lexicographic by code, so the derived `Ord` sorts
/// continents the same way their codes sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContinentCode {
    Af,
    As,
    Eu,
    Na,
    Oc,
    Sa,
}

impl ContinentCode {
    pub const ALL: [ContinentCode; 6] = [
        ContinentCode::Af,
        ContinentCode::As,
        ContinentCode::Eu,
        ContinentCode::Na,
        ContinentCode::Oc,
        ContinentCode::Sa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContinentCode::Af => "af",
            ContinentCode::As => "as",
            ContinentCode::Eu => "eu",
            ContinentCode::Na => "na",
            ContinentCode::Oc => "oc",
            ContinentCode::Sa => "sa",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// Raw region identifiers covered by this continent, in manifest order.
    pub fn region_ids(&self) -> &'static [u8] {
        match self {
            ContinentCode::Af => &[1],
            ContinentCode::As => &[4, 3],
            ContinentCode::Eu => &[2],
            ContinentCode::Na => &[7, 8, 9],
            ContinentCode::Oc => &[5],
            ContinentCode::Sa => &[6],
        }
    }

    /// Reverse lookup of a single leading decimal digit. Total over `1..=9`.
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '1' => Some(ContinentCode::Af),
            '2' => Some(ContinentCode::Eu),
            '3' | '4' => Some(ContinentCode::As),
            '5' => Some(ContinentCode::Oc),
            '6' => Some(ContinentCode::Sa),
            '7' | '8' | '9' => Some(ContinentCode::Na),
            _ => None,
        }
    }

    /// Resolve the continent of a reach or basin id from its first digit.
    pub fn from_id(id: &str) -> Result<Self, CombineError> {
        let first = id
            .chars()
            .next()
            .ok_or_else(|| CombineError::DataIntegrity("empty reach id".to_string()))?;
        Self::from_digit(first).ok_or_else(|| {
            CombineError::DataIntegrity(format!(
                "leading digit '{}' of id {} has no continent mapping",
                first, id
            ))
        })
    }
}

impl fmt::Display for ContinentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of inspecting a source directory.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub continents: Vec<ContinentCode>,
    pub manifest_path: PathBuf,
}

pub fn manifest_file_name(cont_file: &str, expanded: bool) -> String {
    if expanded {
        format!("expanded_{}", cont_file)
    } else {
        cont_file.to_string()
    }
}

/// Determine the continents with reach data under `data_dir`, sorted by code.
///
/// Fails if the directory is missing or holds no entries at all.
pub fn discover_continents(data_dir: &Path) -> Result<Vec<ContinentCode>, CombineError> {
    let entries = match fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CombineError::EmptySourceDir(data_dir.to_path_buf()));
        }
        Err(e) => return Err(CombineError::Io(e)),
    };

    let mut seen_any = false;
    let mut found = BTreeSet::new();

    for entry in entries {
        let entry = entry?;
        seen_any = true;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(token) = region_token(&name) else { continue };
        if DISCOVERY_ARTIFACTS.contains(&token) {
            continue;
        }
        match ContinentCode::from_code(token) {
            Some(code) => {
                debug!(file = %name, continent = %code, "reach fragment found");
                found.insert(code);
            }
            None => warn!(file = %name, token, "reach file has unknown region token, skipping"),
        }
    }

    if !seen_any {
        return Err(CombineError::EmptySourceDir(data_dir.to_path_buf()));
    }

    Ok(found.into_iter().collect())
}

/// The trailing `_`-separated token of a `*reaches*.json` file name.
fn region_token(file_name: &str) -> Option<&str> {
    if !file_name.contains(REACHES_DATASET) {
        return None;
    }
    let stem = file_name.strip_suffix(".json")?;
    stem.rsplit('_').next()
}

pub fn manifest_value(continents: &[ContinentCode]) -> Value {
    let entries = continents
        .iter()
        .map(|code| {
            let mut entry = Map::new();
            entry.insert(
                code.as_str().to_string(),
                Value::from(code.region_ids().to_vec()),
            );
            Value::Object(entry)
        })
        .collect::<Vec<_>>();
    Value::Array(entries)
}

pub fn write_manifest(
    data_dir: &Path,
    file_name: &str,
    continents: &[ContinentCode],
) -> Result<PathBuf, CombineError> {
    let path = data_dir.join(file_name);
    let body = serde_json::to_string_pretty(&manifest_value(continents))?;
    fs::write(&path, body)?;
    info!(path = %path.display(), "Written manifest");
    Ok(path)
}

/// Discover continents and persist the manifest in one step.
pub fn load_continents(
    data_dir: &Path,
    cont_file: &str,
    expanded: bool,
) -> Result<Discovery, CombineError> {
    let continents = discover_continents(data_dir)?;
    let manifest_path = write_manifest(data_dir, &manifest_file_name(cont_file, expanded), &continents)?;
    Ok(Discovery {
        continents,
        manifest_path,
    })
}

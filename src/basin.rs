use crate::continent::ContinentCode;
use crate::CombineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const BASIN_ID_LEN: usize = 4;
/// Sub-directory of the source directory that holds SWORD files.
pub const SWORD_SUBDIR: &str = "sword";

/// Existence check for continent+version SWORD patch files.
pub trait SwordProbeLike {
    fn patch_exists(&self, file_name: &str) -> bool;
}

/// Looks for patch files on the local filesystem.
pub struct DirectoryProbe {
    sword_dir: PathBuf,
}

impl DirectoryProbe {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            sword_dir: data_dir.join(SWORD_SUBDIR),
        }
    }
}

impl SwordProbeLike for DirectoryProbe {
    fn patch_exists(&self, file_name: &str) -> bool {
        self.sword_dir.join(file_name).is_file()
    }
}

/// SWORD file names for one continent and data version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwordFiles {
    pub sword: String,
    pub sos: String,
}

impl SwordFiles {
    pub fn resolve(continent: ContinentCode, version: &str, probe: &dyn SwordProbeLike) -> Self {
        let patch = format!("{}_sword_v{}_patch.nc", continent, version);
        let sword = if probe.patch_exists(&patch) {
            patch
        } else {
            format!("{}_sword_v{}.nc", continent, version)
        };
        Self {
            sword,
            sos: format!("{}_sword_v{}_SOS_priors.nc", continent, version),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachRecord {
    pub reach_id: u64,
    pub sword: String,
    pub swot: String,
    pub sos: String,
}

impl ReachRecord {
    pub fn from_id(reach_id: u64, files: &SwordFiles) -> Self {
        Self {
            reach_id,
            sword: files.sword.clone(),
            swot: format!("{}_SWOT.nc", reach_id),
            sos: files.sos.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasinRecord {
    pub basin_id: String,
    #[serde(rename = "reach_id")]
    pub reach_ids: Vec<u64>,
    pub sword: String,
    pub sos: String,
}

/// Memoizes probe lookups; the same continent is resolved once per run.
pub struct SwordNames<'a> {
    version: &'a str,
    probe: &'a dyn SwordProbeLike,
    cache: BTreeMap<ContinentCode, SwordFiles>,
}

impl<'a> SwordNames<'a> {
    pub fn new(version: &'a str, probe: &'a dyn SwordProbeLike) -> Self {
        Self {
            version,
            probe,
            cache: BTreeMap::new(),
        }
    }

    pub fn for_id(&mut self, id: &str) -> Result<&SwordFiles, CombineError> {
        let continent = ContinentCode::from_id(id)?;
        let (version, probe) = (self.version, self.probe);
        Ok(&*self
            .cache
            .entry(continent)
            .or_insert_with(|| SwordFiles::resolve(continent, version, probe)))
    }
}

/// Extract a reach id from a merged `reaches` element: either a bare integer
/// or an object carrying `reach_id`.
pub fn reach_id_of(element: &Value) -> Result<u64, CombineError> {
    let raw = match element {
        Value::Object(obj) => obj.get("reach_id"),
        other => Some(other),
    };
    match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| CombineError::DataIntegrity(format!("reach entry without a usable reach_id: {}", element)))
}

pub fn basin_id_of(reach_id: u64) -> Result<String, CombineError> {
    let text = reach_id.to_string();
    text.get(..BASIN_ID_LEN)
        .map(str::to_string)
        .ok_or_else(|| {
            CombineError::DataIntegrity(format!(
                "reach id {} shorter than {} digits",
                reach_id, BASIN_ID_LEN
            ))
        })
}

/// Expand bare ids, numeric or string, into full reach records; objects pass
/// through.
pub fn normalize_reaches(
    elements: Vec<Value>,
    names: &mut SwordNames<'_>,
) -> Result<Vec<Value>, CombineError> {
    elements
        .into_iter()
        .map(|element| match element {
            Value::Number(_) | Value::String(_) => {
                let id = reach_id_of(&element)?;
                let files = names.for_id(&id.to_string())?;
                Ok(serde_json::to_value(ReachRecord::from_id(id, files))?)
            }
            other => Ok(other),
        })
        .collect()
}

/// One basin per distinct 4-digit prefix across the whole merged reach set.
pub fn derive_basins(
    reaches: &[Value],
    names: &mut SwordNames<'_>,
) -> Result<Vec<BasinRecord>, CombineError> {
    let mut members: BTreeMap<String, BTreeSet<u64>> = BTreeMap::new();
    for element in reaches {
        let id = reach_id_of(element)?;
        members.entry(basin_id_of(id)?).or_default().insert(id);
    }

    let mut basins = Vec::with_capacity(members.len());
    for (basin_id, ids) in members {
        let files = names.for_id(&basin_id)?;
        debug!(basin_id = %basin_id, reaches = ids.len(), sword = %files.sword, "basin derived");
        basins.push(BasinRecord {
            sword: files.sword.clone(),
            sos: files.sos.clone(),
            reach_ids: ids.into_iter().collect(),
            basin_id,
        });
    }
    info!(basins = basins.len(), reaches = reaches.len(), "Derived basins");
    Ok(basins)
}

use crate::CombineError;
use std::path::PathBuf;

pub const DEFAULT_CONT_FILE: &str = "continent.json";
/// Format of the dated key prefix used when no explicit upload prefix is given.
pub const UPLOAD_PREFIX_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub prefix: Option<String>,
}

/// Validated settings for one combine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineConfig {
    pub data_dir: PathBuf,
    pub cont_file: String,
    /// SWORD data version without the leading `v` (`16`, not `v16`).
    pub sword_version: String,
    pub expanded: bool,
    pub delete: bool,
    pub upload: Option<UploadTarget>,
}

impl CombineConfig {
    pub fn new(data_dir: PathBuf, sword_version: &str) -> Result<Self, CombineError> {
        Ok(Self {
            data_dir,
            cont_file: DEFAULT_CONT_FILE.to_string(),
            sword_version: normalize_sword_version(sword_version)?,
            expanded: false,
            delete: false,
            upload: None,
        })
    }

    pub fn with_cont_file(mut self, cont_file: &str) -> Result<Self, CombineError> {
        if cont_file.is_empty() || cont_file.contains('/') {
            return Err(CombineError::Config(format!(
                "continent file must be a plain file name, got '{}'",
                cont_file
            )));
        }
        self.cont_file = cont_file.to_string();
        Ok(self)
    }

    pub fn expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    pub fn delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }

    pub fn upload_to(mut self, bucket: &str, prefix: Option<String>) -> Self {
        self.upload = Some(UploadTarget {
            bucket: bucket.to_string(),
            prefix,
        });
        self
    }
}

/// Accept `16` or `v16`; reject anything that would produce a broken file name.
pub fn normalize_sword_version(raw: &str) -> Result<String, CombineError> {
    let trimmed = raw.trim();
    let version = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
        return Err(CombineError::Config(format!("invalid SWORD version '{}'", raw)));
    }
    Ok(version.to_string())
}

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum CombineError {
    EmptySourceDir(PathBuf),
    Io(std::io::Error),
    Json(serde_json::Error),
    DataIntegrity(String),
    Upload(String),
    Config(String),
}

impl fmt::Display for CombineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineError::EmptySourceDir(p) => write!(f, "no files found at {}", p.display()),
            CombineError::Io(e) => write!(f, "IO error: {}", e),
            CombineError::Json(e) => write!(f, "JSON error: {}", e),
            CombineError::DataIntegrity(e) => write!(f, "Data integrity error: {}", e),
            CombineError::Upload(e) => write!(f, "Upload error: {}", e),
            CombineError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for CombineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CombineError::Io(e) => Some(e),
            CombineError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CombineError {
    fn from(err: std::io::Error) -> Self {
        CombineError::Io(err)
    }
}

impl From<serde_json::Error> for CombineError {
    fn from(err: serde_json::Error) -> Self {
        CombineError::Json(err)
    }
}

use serde::{Serialize, Serializer};

/// Failure reported by one of the engine's commands.
///
/// The engine speaks in plain strings over IPC; the variants let the core
/// react to the cases it cares about (duplicates, busy files) without
/// string matching at every call site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("File already added: {0}")]
    Duplicate(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("File is being converted: {0}")]
    Busy(String),
    #[error("Failed to fetch URL: {0}")]
    Fetch(String),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("{0}")]
    Other(String),
}

impl Serialize for BackendError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("No output directory selected")]
    NoOutputDirectory,
    #[error("Output directory must be an absolute path: {0}")]
    RelativeOutputDirectory(String),
    #[error("File was not added from a URL: {0}")]
    NotUrlSourced(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CoreError {
    /// True for failures that were rejected locally and never reached the engine.
    pub fn is_validation(&self) -> bool {
        !matches!(self, CoreError::Backend(_))
    }
}

impl Serialize for CoreError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

use crate::backend::model::FileEntry;
use serde::Serialize;

/// Per-file conversion state. Lives beside the file list, never inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum ConversionStatus {
    Idle,
    Converting,
    Completed,
    Error(String),
    Skipped(String),
}

impl ConversionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConversionStatus::Completed | ConversionStatus::Error(_) | ConversionStatus::Skipped(_)
        )
    }
}

/// A list entry combined with its status, built at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileView {
    pub entry: FileEntry,
    pub status: ConversionStatus,
}

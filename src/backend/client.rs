use super::model::{ConversionRequest, ConversionResult, ExifData, FileEntry, ProgressEvent};
use crate::error::BackendError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Commands exposed by the conversion engine.
///
/// Every call is a round-trip; the engine owns the file list and is the
/// final arbiter of every mutation.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Full list in insertion order.
    async fn get_file_list(&self) -> Result<Vec<FileEntry>, BackendError>;

    /// Fails with [`BackendError::Duplicate`] when an unconverted entry
    /// already has this path.
    async fn add_file_from_path(&self, path: &str) -> Result<FileEntry, BackendError>;

    async fn add_file_from_url(&self, url: &str) -> Result<FileEntry, BackendError>;

    /// Fails with [`BackendError::Busy`] while the file is converting.
    async fn remove_file(&self, id: &str) -> Result<(), BackendError>;

    /// Removes every file that is not currently converting.
    async fn clear_files(&self) -> Result<(), BackendError>;

    async fn remove_converted_files(&self) -> Result<(), BackendError>;

    async fn convert_images(
        &self,
        request: &ConversionRequest,
    ) -> Result<Vec<ConversionResult>, BackendError>;

    async fn save_file(&self, id: &str, save_path: &str) -> Result<(), BackendError>;

    async fn get_cpu_count(&self) -> Result<usize, BackendError>;

    async fn extract_exif(&self, data: &[u8]) -> Result<Option<ExifData>, BackendError>;

    /// Subscribe to `conversion-progress`.
    fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent>;
}

/// Native dialogs. `None` means the user cancelled.
#[async_trait]
pub trait Dialogs: Send + Sync {
    async fn pick_directory(&self) -> Option<PathBuf>;

    async fn pick_files(&self, extensions: &[&str]) -> Option<Vec<PathBuf>>;

    async fn pick_save_path(&self, default_name: &str) -> Option<PathBuf>;
}

use super::gate::DropGate;
use super::scanner;
use super::url::parse_image_url;
use crate::backend::model::{ExifData, FileEntry};
use crate::backend::{Backend, Dialogs};
use crate::error::{BackendError, CoreError};
use crate::files::FileListSync;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Window drag-and-drop phases as the shell reports them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DragDropEvent {
    Enter {
        #[serde(default)]
        paths: Vec<PathBuf>,
    },
    Over,
    Drop {
        paths: Vec<PathBuf>,
    },
    Leave,
}

/// Result of one ingestion batch. Each input file lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub added: Vec<FileEntry>,
    /// Paths the engine already tracks; not an error.
    pub duplicates: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn requested(&self) -> usize {
        self.added.len() + self.duplicates.len() + self.failed.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Hovering,
    Left,
    /// A duplicate `drop` arrived while the latch was closed.
    Ignored,
    Ingested(BatchReport),
}

/// State of the "add from URL" dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlDialog {
    pub open: bool,
    pub input: String,
    pub error: Option<String>,
    pub submitting: bool,
}

/// Turns drops, picker selections and URL submissions into add commands.
pub struct IngestPipeline {
    backend: Arc<dyn Backend>,
    files: Arc<FileListSync>,
    dialogs: Arc<dyn Dialogs>,
    gate: DropGate,
    drag_active: AtomicBool,
    url_dialog: Mutex<UrlDialog>,
}

impl IngestPipeline {
    pub fn new(
        backend: Arc<dyn Backend>,
        files: Arc<FileListSync>,
        dialogs: Arc<dyn Dialogs>,
        gate: DropGate,
    ) -> Self {
        IngestPipeline {
            backend,
            files,
            dialogs,
            gate,
            drag_active: AtomicBool::new(false),
            url_dialog: Mutex::new(UrlDialog::default()),
        }
    }

    pub fn is_drag_active(&self) -> bool {
        self.drag_active.load(Ordering::SeqCst)
    }

    pub async fn handle_drag_event(&self, event: DragDropEvent) -> DropOutcome {
        match event {
            DragDropEvent::Enter { .. } | DragDropEvent::Over => {
                self.drag_active.store(true, Ordering::SeqCst);
                DropOutcome::Hovering
            }
            DragDropEvent::Leave => {
                self.drag_active.store(false, Ordering::SeqCst);
                DropOutcome::Left
            }
            DragDropEvent::Drop { paths } => {
                let Some(permit) = self.gate.try_acquire() else {
                    tracing::debug!("ingest: ignoring duplicate drop of {} paths", paths.len());
                    self.drag_active.store(false, Ordering::SeqCst);
                    return DropOutcome::Ignored;
                };
                let report = self.ingest_paths(&paths).await;
                self.drag_active.store(false, Ordering::SeqCst);
                drop(permit);
                DropOutcome::Ingested(report)
            }
        }
    }

    /// Add every distinct file under `paths` concurrently, then refresh once.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> BatchReport {
        let targets = scanner::collect_files(paths);
        let mut report = BatchReport::default();
        if targets.is_empty() {
            return report;
        }
        tracing::info!("ingest: adding {} files", targets.len());

        let results = futures::future::join_all(
            targets
                .iter()
                .map(|path| self.backend.add_file_from_path(path)),
        )
        .await;

        for (path, result) in targets.into_iter().zip(results) {
            match result {
                Ok(entry) => report.added.push(entry),
                Err(BackendError::Duplicate(_)) => {
                    tracing::debug!("ingest: {} already in list", path);
                    report.duplicates.push(path);
                }
                Err(e) => {
                    tracing::warn!("ingest: failed to add {}: {}", path, e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        if let Err(e) = self.files.refresh().await {
            tracing::warn!("ingest: refresh after batch failed: {}", e);
        }
        tracing::info!(
            "ingest: batch done added={} duplicates={} failed={}",
            report.added.len(),
            report.duplicates.len(),
            report.failed.len()
        );
        report
    }

    /// Let the user pick files and add them. `None` if the picker was cancelled.
    pub async fn ingest_from_picker(&self) -> Option<BatchReport> {
        let paths = self.dialogs.pick_files(scanner::IMAGE_EXTENSIONS).await?;
        Some(self.ingest_paths(&paths).await)
    }

    /// Validate locally, then add. Invalid input never reaches the engine.
    pub async fn add_url(&self, input: &str) -> Result<FileEntry, CoreError> {
        let url = parse_image_url(input)?;
        self.files.add_from_url(url.as_str()).await
    }

    pub fn url_dialog(&self) -> UrlDialog {
        self.dialog().clone()
    }

    pub fn open_url_dialog(&self) {
        let mut d = self.dialog();
        d.open = true;
        d.error = None;
    }

    pub fn set_url_input(&self, input: impl Into<String>) {
        self.dialog().input = input.into();
    }

    pub fn cancel_url_dialog(&self) {
        *self.dialog() = UrlDialog::default();
    }

    /// Submit the dialog's input.
    ///
    /// On success the dialog closes and clears. On failure it stays open with
    /// the input untouched and the message in `error`. Returns `Ok(None)` if a
    /// submission is already running.
    pub async fn submit_url(&self) -> Result<Option<FileEntry>, CoreError> {
        let input = {
            let mut d = self.dialog();
            if d.submitting {
                return Ok(None);
            }
            d.submitting = true;
            d.error = None;
            d.input.clone()
        };

        let result = self.add_url(&input).await;

        let mut d = self.dialog();
        d.submitting = false;
        match result {
            Ok(entry) => {
                *d = UrlDialog::default();
                Ok(Some(entry))
            }
            Err(e) => {
                d.open = true;
                d.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// EXIF for a file on disk, via the engine. Failures are logged and yield `None`.
    pub async fn preview_exif(&self, path: &Path) -> Option<ExifData> {
        let data = match tokio::fs::read(path).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("ingest: cannot read {:?} for EXIF: {}", path, e);
                return None;
            }
        };
        match self.backend.extract_exif(&data).await {
            Ok(exif) => exif,
            Err(e) => {
                tracing::warn!("ingest: EXIF extraction failed for {:?}: {}", path, e);
                None
            }
        }
    }

    fn dialog(&self) -> MutexGuard<'_, UrlDialog> {
        self.url_dialog.lock().unwrap_or_else(|e| e.into_inner())
    }
}

use crate::backend::model::{ConversionRequest, ConversionResult, OutputTarget};
use crate::backend::{Backend, Dialogs};
use crate::error::CoreError;
use crate::files::FileListSync;
use crate::progress::ProgressReducer;
use crate::settings::{ConversionSettings, SettingsStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a conversion cannot start right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Blocked {
    NothingToConvert,
    AlreadyConverting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub converted: usize,
    pub original_bytes: u64,
    pub converted_bytes: u64,
    pub results: Vec<ConversionResult>,
}

impl ConversionSummary {
    fn from_results(results: Vec<ConversionResult>) -> Self {
        ConversionSummary {
            converted: results.len(),
            original_bytes: results.iter().map(|r| r.original_size).sum(),
            converted_bytes: results.iter().map(|r| r.converted_size).sum(),
            results,
        }
    }

    /// Bytes saved across the batch; negative if outputs grew.
    pub fn saved_bytes(&self) -> i64 {
        self.original_bytes as i64 - self.converted_bytes as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Blocked(Blocked),
    /// The directory picker was dismissed; nothing was sent.
    Cancelled,
    Finished(ConversionSummary),
}

/// Starts batch conversions from the current settings and file list.
///
/// At most one batch runs at a time, and none starts while files are still
/// reported as converting. Failures are returned, never retried.
pub struct ConversionDispatcher {
    backend: Arc<dyn Backend>,
    dialogs: Arc<dyn Dialogs>,
    settings: Arc<SettingsStore>,
    files: Arc<FileListSync>,
    progress: Arc<ProgressReducer>,
    in_flight: AtomicBool,
}

impl ConversionDispatcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        dialogs: Arc<dyn Dialogs>,
        settings: Arc<SettingsStore>,
        files: Arc<FileListSync>,
        progress: Arc<ProgressReducer>,
    ) -> Self {
        ConversionDispatcher {
            backend,
            dialogs,
            settings,
            files,
            progress,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn blocked_reason(&self) -> Option<Blocked> {
        if self.in_flight.load(Ordering::SeqCst) || self.progress.is_converting() {
            Some(Blocked::AlreadyConverting)
        } else if self.files.eligible_count() == 0 {
            Some(Blocked::NothingToConvert)
        } else {
            None
        }
    }

    pub fn can_convert(&self) -> bool {
        self.blocked_reason().is_none()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve the output location and send one `convert_images` request.
    pub async fn dispatch(&self) -> Result<DispatchOutcome, CoreError> {
        if let Some(reason) = self.blocked_reason() {
            tracing::info!("convert: not starting ({:?})", reason);
            return Ok(DispatchOutcome::Blocked(reason));
        }
        // Claim the slot before the first await so a second trigger sees it.
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(DispatchOutcome::Blocked(Blocked::AlreadyConverting));
        }
        let _slot = InFlight(&self.in_flight);

        let settings = self.settings.get();
        let Some(output_dir) = self.resolve_output().await? else {
            tracing::info!("convert: output directory selection cancelled");
            return Ok(DispatchOutcome::Cancelled);
        };
        let cpu_count = self.cpu_count().await;
        let request = build_request(&settings, output_dir, cpu_count);

        tracing::info!(
            "convert: starting format={:?} quality={} concurrency={} files={}",
            request.target_format,
            request.quality,
            request.max_concurrent,
            self.files.eligible_count()
        );
        let results = self.backend.convert_images(&request).await.map_err(|e| {
            tracing::warn!("convert: batch failed: {}", e);
            CoreError::from(e)
        })?;

        if let Err(e) = self.files.refresh().await {
            tracing::warn!("convert: refresh after batch failed: {}", e);
        }
        let summary = ConversionSummary::from_results(results);
        tracing::info!(
            "convert: finished converted={} saved_bytes={}",
            summary.converted,
            summary.saved_bytes()
        );
        Ok(DispatchOutcome::Finished(summary))
    }

    async fn resolve_output(&self) -> Result<Option<OutputTarget>, CoreError> {
        if self.settings.get().use_source_directory {
            return Ok(Some(OutputTarget::SourceDirectory));
        }
        let Some(dir) = self.dialogs.pick_directory().await else {
            return Ok(None);
        };
        if dir.as_os_str().is_empty() {
            return Err(CoreError::NoOutputDirectory);
        }
        if !dir.is_absolute() {
            return Err(CoreError::RelativeOutputDirectory(
                dir.to_string_lossy().into_owned(),
            ));
        }
        Ok(Some(OutputTarget::Directory(dir)))
    }

    async fn cpu_count(&self) -> usize {
        match self.backend.get_cpu_count().await {
            Ok(n) => n.max(1),
            Err(e) => {
                tracing::warn!("convert: cannot get CPU count, assuming 1: {}", e);
                1
            }
        }
    }
}

pub fn build_request(
    settings: &ConversionSettings,
    output_dir: OutputTarget,
    cpu_count: usize,
) -> ConversionRequest {
    ConversionRequest {
        target_format: settings.target_format,
        quality: settings.resolved_quality(),
        avif_speed: settings.avif_speed,
        preserve_exif: settings.preserve_exif,
        preserve_timestamps: settings.preserve_timestamps,
        output_dir,
        max_concurrent: settings.effective_concurrency(cpu_count),
        create_subfolder: settings.create_subfolder,
        subfolder_name: settings.subfolder_name.clone(),
        url_files_fallback_dir: settings.url_files_fallback_directory.clone(),
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

use crate::backend::{Backend, Dialogs};
use crate::convert::ConversionDispatcher;
use crate::error::{BackendError, CoreError};
use crate::files::FileListSync;
use crate::ingest::{DropGate, IngestPipeline};
use crate::progress::ProgressReducer;
use crate::settings::SettingsStore;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything the window needs, wired to one engine and one set of dialogs.
///
/// Must be created inside a tokio runtime: the progress reducer is spawned
/// immediately and runs until the engine's event stream closes.
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub dialogs: Arc<dyn Dialogs>,
    pub settings: Arc<SettingsStore>,
    pub files: Arc<FileListSync>,
    pub progress: Arc<ProgressReducer>,
    pub ingest: IngestPipeline,
    pub dispatcher: ConversionDispatcher,
    reducer_task: JoinHandle<()>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn Backend>,
        dialogs: Arc<dyn Dialogs>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let files = Arc::new(FileListSync::new(Arc::clone(&backend)));
        let progress = Arc::new(ProgressReducer::new(Arc::clone(&files)));
        // Subscribe before anything can trigger a conversion.
        let reducer_task = progress.spawn(backend.subscribe_progress());
        let ingest = IngestPipeline::new(
            Arc::clone(&backend),
            Arc::clone(&files),
            Arc::clone(&dialogs),
            DropGate::default(),
        );
        let dispatcher = ConversionDispatcher::new(
            Arc::clone(&backend),
            Arc::clone(&dialogs),
            Arc::clone(&settings),
            Arc::clone(&files),
            Arc::clone(&progress),
        );
        AppState {
            backend,
            dialogs,
            settings,
            files,
            progress,
            ingest,
            dispatcher,
            reducer_task,
        }
    }

    /// Settings from the user's config directory, flushed by a writer thread.
    pub fn with_persisted_settings(backend: Arc<dyn Backend>, dialogs: Arc<dyn Dialogs>) -> Self {
        let settings = match crate::settings::manager::settings_home() {
            Some(home) => SettingsStore::open(home),
            None => {
                tracing::warn!("settings: no config directory, settings will not persist");
                SettingsStore::default()
            }
        };
        AppState::new(backend, dialogs, Arc::new(settings))
    }

    /// Initial load of the engine's list.
    pub async fn load(&self) -> Result<(), CoreError> {
        self.files.refresh().await
    }

    /// Ask where to save a URL-sourced file, then have the engine write it.
    ///
    /// Returns `Ok(false)` if the save dialog was dismissed.
    pub async fn save_file_as(&self, id: &str) -> Result<bool, CoreError> {
        let Some(entry) = self.files.get(id) else {
            return Err(BackendError::NotFound(id.to_string()).into());
        };
        if !entry.is_url_sourced() {
            return Err(CoreError::NotUrlSourced(id.to_string()));
        }
        let Some(path) = self.dialogs.pick_save_path(&entry.name).await else {
            return Ok(false);
        };
        self.files.save_file(&entry.id, &path).await?;
        Ok(true)
    }

    /// Label for the concurrency control, using the engine's CPU count.
    pub async fn concurrency_label(&self) -> String {
        let cpu = match self.backend.get_cpu_count().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("settings: cannot get CPU count: {}", e);
                1
            }
        };
        self.settings.get().concurrency_label(cpu)
    }

    /// True while any control should show a spinner.
    pub fn is_busy(&self) -> bool {
        self.files.is_loading() || self.progress.is_converting() || self.dispatcher.is_in_flight()
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.reducer_task.abort();
    }
}

use crate::backend::model::{FileEntry, FileId};
use crate::backend::Backend;
use crate::error::{BackendError, CoreError};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

pub type ListSnapshot = Arc<Vec<FileEntry>>;

struct ListState {
    entries: ListSnapshot,
    /// Sequence number of the refresh whose response is currently applied.
    applied_seq: u64,
}

/// In-memory mirror of the engine's file list.
///
/// The list is never edited locally: every mutation is a command to the
/// engine followed by a full refresh. Refreshes are numbered when issued and
/// a response is only applied if no later-issued refresh has been applied
/// already, so a slow response cannot overwrite fresher state.
pub struct FileListSync {
    backend: Arc<dyn Backend>,
    state: Mutex<ListState>,
    next_seq: AtomicU64,
    pending_adds: AtomicUsize,
    snapshot_tx: watch::Sender<ListSnapshot>,
}

impl FileListSync {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let empty: ListSnapshot = Arc::new(Vec::new());
        let (snapshot_tx, _) = watch::channel(Arc::clone(&empty));
        FileListSync {
            backend,
            state: Mutex::new(ListState {
                entries: empty,
                applied_seq: 0,
            }),
            next_seq: AtomicU64::new(0),
            pending_adds: AtomicUsize::new(0),
            snapshot_tx,
        }
    }

    pub fn entries(&self) -> ListSnapshot {
        Arc::clone(&self.lock().entries)
    }

    pub fn get(&self, id: &str) -> Option<FileEntry> {
        self.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Files that still need converting.
    pub fn eligible_count(&self) -> usize {
        self.lock().entries.iter().filter(|e| !e.converted).count()
    }

    pub fn converted_count(&self) -> usize {
        self.lock().entries.iter().filter(|e| e.converted).count()
    }

    /// True while an add command is in flight.
    pub fn is_loading(&self) -> bool {
        self.pending_adds.load(Ordering::SeqCst) > 0
    }

    /// Receives every applied list.
    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Fetch the full list and replace local state, unless a refresh issued
    /// later has already been applied.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let list = self.backend.get_file_list().await.map_err(|e| {
            tracing::warn!("file_list: refresh #{} failed: {}", seq, e);
            CoreError::from(e)
        })?;
        self.apply(seq, list);
        Ok(())
    }

    fn apply(&self, seq: u64, list: Vec<FileEntry>) -> bool {
        let mut state = self.lock();
        if seq < state.applied_seq {
            tracing::debug!(
                "file_list: discarding stale refresh #{} (applied #{})",
                seq,
                state.applied_seq
            );
            return false;
        }
        state.applied_seq = seq;
        state.entries = Arc::new(list);
        self.snapshot_tx.send_replace(Arc::clone(&state.entries));
        true
    }

    /// Refresh after a mutation the engine already accepted. A failure here
    /// does not undo the mutation, so it is logged rather than returned.
    async fn refresh_after(&self, op: &str) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("file_list: {} succeeded but refresh failed: {}", op, e);
        }
    }

    pub async fn add_from_path(&self, path: &str) -> Result<FileEntry, CoreError> {
        let _loading = LoadingGuard::new(&self.pending_adds);
        let entry = self
            .backend
            .add_file_from_path(path)
            .await
            .map_err(|e| log_failure("add_from_path", path, e))?;
        tracing::info!("file_list: added {} as {}", path, entry.id);
        self.refresh_after("add_from_path").await;
        Ok(entry)
    }

    pub async fn add_from_url(&self, url: &str) -> Result<FileEntry, CoreError> {
        let _loading = LoadingGuard::new(&self.pending_adds);
        let entry = self
            .backend
            .add_file_from_url(url)
            .await
            .map_err(|e| log_failure("add_from_url", url, e))?;
        tracing::info!("file_list: added {} as {}", url, entry.id);
        self.refresh_after("add_from_url").await;
        Ok(entry)
    }

    pub async fn remove_file(&self, id: &str) -> Result<(), CoreError> {
        self.backend
            .remove_file(id)
            .await
            .map_err(|e| log_failure("remove_file", id, e))?;
        tracing::info!("file_list: removed {}", id);
        self.refresh_after("remove_file").await;
        Ok(())
    }

    pub async fn clear_files(&self) -> Result<(), CoreError> {
        self.backend
            .clear_files()
            .await
            .map_err(|e| log_failure("clear_files", "*", e))?;
        tracing::info!("file_list: cleared");
        self.refresh_after("clear_files").await;
        Ok(())
    }

    pub async fn remove_converted_files(&self) -> Result<(), CoreError> {
        self.backend
            .remove_converted_files()
            .await
            .map_err(|e| log_failure("remove_converted_files", "*", e))?;
        tracing::info!("file_list: removed converted files");
        self.refresh_after("remove_converted_files").await;
        Ok(())
    }

    /// Write a URL-sourced file's original bytes to `save_path`.
    pub async fn save_file(&self, id: &FileId, save_path: &Path) -> Result<(), CoreError> {
        if let Some(entry) = self.get(id) {
            if !entry.is_url_sourced() {
                return Err(CoreError::NotUrlSourced(id.clone()));
            }
        }
        let save_path = save_path.to_string_lossy();
        self.backend
            .save_file(id, &save_path)
            .await
            .map_err(|e| log_failure("save_file", id, e))?;
        tracing::info!("file_list: saved {} to {}", id, save_path);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn log_failure(op: &str, target: &str, e: BackendError) -> CoreError {
    tracing::warn!("file_list: {} {} failed: {}", op, target, e);
    CoreError::Backend(e)
}

struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        LoadingGuard(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

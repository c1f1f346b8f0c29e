use super::model::{ConversionStatus, FileView};
use crate::backend::model::{FileEntry, FileId, ProgressEvent, ProgressStatus};
use crate::files::{FileListSync, ListSnapshot};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const DEFAULT_ERROR_MESSAGE: &str = "Conversion failed";
const DEFAULT_SKIP_REASON: &str = "Skipped";

#[derive(Debug, Default)]
struct StatusMaps {
    converting: HashSet<FileId>,
    completed: HashSet<FileId>,
    errors: HashMap<FileId, String>,
    skipped: HashMap<FileId, String>,
}

impl StatusMaps {
    fn clear_terminal(&mut self, id: &str) {
        self.completed.remove(id);
        self.errors.remove(id);
        self.skipped.remove(id);
    }
}

/// Folds `conversion-progress` events into per-file status.
///
/// Per id: `Idle → Converting → {Completed, Error, Skipped}`. A new
/// `Converting` restarts the cycle and drops the previous outcome. Terminal
/// events without a preceding `Converting` are accepted as-is.
pub struct ProgressReducer {
    maps: Mutex<StatusMaps>,
    files: Arc<FileListSync>,
}

impl ProgressReducer {
    pub fn new(files: Arc<FileListSync>) -> Self {
        ProgressReducer {
            maps: Mutex::new(StatusMaps::default()),
            files,
        }
    }

    /// Apply one event. Returns true when the file list should be refreshed
    /// to pick up the engine's `converted` flag.
    pub fn apply(&self, event: &ProgressEvent) -> bool {
        let id = event.file_id.as_str();
        let mut maps = self.lock();
        match event.status {
            ProgressStatus::Converting => {
                maps.clear_terminal(id);
                maps.converting.insert(id.to_string());
                tracing::debug!("progress: {} ({}) converting", event.file_name, id);
                false
            }
            ProgressStatus::Completed => {
                maps.converting.remove(id);
                maps.clear_terminal(id);
                maps.completed.insert(id.to_string());
                tracing::debug!("progress: {} ({}) completed", event.file_name, id);
                true
            }
            ProgressStatus::Error => {
                let message = event
                    .error_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
                tracing::warn!("progress: {} ({}) failed: {}", event.file_name, id, message);
                maps.converting.remove(id);
                maps.clear_terminal(id);
                maps.errors.insert(id.to_string(), message);
                false
            }
            ProgressStatus::Skipped => {
                let reason = event
                    .error_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SKIP_REASON.to_string());
                tracing::info!("progress: {} ({}) skipped: {}", event.file_name, id, reason);
                maps.converting.remove(id);
                maps.clear_terminal(id);
                maps.skipped.insert(id.to_string(), reason);
                false
            }
        }
    }

    /// Apply one event and refresh the list if it completed a file.
    pub async fn handle(&self, event: &ProgressEvent) {
        if self.apply(event) {
            self.refresh().await;
        }
    }

    /// Drop annotations of files that are no longer in the list.
    pub fn prune(&self, live: &[FileEntry]) {
        let ids: HashSet<&str> = live.iter().map(|e| e.id.as_str()).collect();
        let mut maps = self.lock();
        maps.converting.retain(|id| ids.contains(id.as_str()));
        maps.completed.retain(|id| ids.contains(id.as_str()));
        maps.errors.retain(|id, _| ids.contains(id.as_str()));
        maps.skipped.retain(|id, _| ids.contains(id.as_str()));
    }

    pub fn is_converting(&self) -> bool {
        !self.lock().converting.is_empty()
    }

    pub fn converting_count(&self) -> usize {
        self.lock().converting.len()
    }

    pub fn converting_ids(&self) -> HashSet<FileId> {
        self.lock().converting.clone()
    }

    pub fn error_for(&self, id: &str) -> Option<String> {
        self.lock().errors.get(id).cloned()
    }

    pub fn errors(&self) -> HashMap<FileId, String> {
        self.lock().errors.clone()
    }

    pub fn skipped(&self) -> HashMap<FileId, String> {
        self.lock().skipped.clone()
    }

    /// Status of one entry; the engine's `converted` flag counts as completed.
    pub fn status_of(&self, entry: &FileEntry) -> ConversionStatus {
        status_from(&self.lock(), entry)
    }

    /// The current list with each entry's status attached.
    pub fn views(&self) -> Vec<FileView> {
        let entries = self.files.entries();
        let maps = self.lock();
        entries
            .iter()
            .map(|entry| FileView {
                entry: entry.clone(),
                status: status_from(&maps, entry),
            })
            .collect()
    }

    /// Consume events until the stream closes.
    ///
    /// Events already queued are applied together and followed by a single
    /// refresh, so a burst of completions costs one round-trip.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<ProgressEvent>,
        mut list: watch::Receiver<ListSnapshot>,
    ) {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        let mut needs_refresh = self.apply(&event);
                        loop {
                            match events.try_recv() {
                                Ok(event) => needs_refresh |= self.apply(&event),
                                Err(TryRecvError::Lagged(n)) => {
                                    tracing::warn!("progress: missed {} events", n);
                                    needs_refresh = true;
                                }
                                Err(_) => break,
                            }
                        }
                        if needs_refresh {
                            self.refresh().await;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("progress: missed {} events, refreshing", n);
                        self.refresh().await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("progress: event stream closed");
                        break;
                    }
                },
                changed = list.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = list.borrow_and_update().clone();
                    self.prune(&snapshot);
                }
            }
        }
    }

    pub fn spawn(self: &Arc<Self>, events: broadcast::Receiver<ProgressEvent>) -> JoinHandle<()> {
        let list = self.files.subscribe();
        tokio::spawn(Arc::clone(self).run(events, list))
    }

    async fn refresh(&self) {
        if let Err(e) = self.files.refresh().await {
            tracing::warn!("progress: refresh after completion failed: {}", e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusMaps> {
        self.maps.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn status_from(maps: &StatusMaps, entry: &FileEntry) -> ConversionStatus {
    let id = entry.id.as_str();
    if maps.converting.contains(id) {
        ConversionStatus::Converting
    } else if let Some(msg) = maps.errors.get(id) {
        ConversionStatus::Error(msg.clone())
    } else if let Some(reason) = maps.skipped.get(id) {
        ConversionStatus::Skipped(reason.clone())
    } else if maps.completed.contains(id) || entry.converted {
        ConversionStatus::Completed
    } else {
        ConversionStatus::Idle
    }
}

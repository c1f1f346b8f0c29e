//! In-memory stand-ins for the engine and the native dialogs.
//! They follow the engine's rules closely enough for the core's tests:
//! duplicate unconverted paths are rejected, converting files cannot be
//! removed, and `clear_files` keeps converting files.

use crate::backend::model::{
    ConversionRequest, ConversionResult, ExifData, FileEntry, OutputTarget, ProgressEvent,
    ProgressStatus, SourceDescriptor,
};
use crate::backend::{Backend, Dialogs};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Default)]
struct Inner {
    files: Vec<FileEntry>,
    converting: HashSet<String>,
    next_id: u64,
    failures: HashMap<&'static str, BackendError>,
    failing_names: HashMap<String, String>,
    list_delay: Option<Duration>,
    list_calls: usize,
    add_delay: Option<Duration>,
    convert_delay: Option<Duration>,
    add_calls: Vec<String>,
    requests: Vec<ConversionRequest>,
    saved: Vec<(String, String)>,
    exif: Option<ExifData>,
    cpu_count: usize,
}

pub struct FakeBackend {
    inner: Mutex<Inner>,
    progress_tx: broadcast::Sender<ProgressEvent>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(256);
        FakeBackend {
            inner: Mutex::new(Inner {
                cpu_count: 8,
                ..Default::default()
            }),
            progress_tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn snapshot(&self) -> Vec<FileEntry> {
        self.lock().files.clone()
    }

    pub fn fail_next(&self, op: &'static str, err: BackendError) {
        self.lock().failures.insert(op, err);
    }

    /// Emit an `error` event instead of converting files with this name.
    pub fn fail_file(&self, name: &str, message: &str) {
        self.lock()
            .failing_names
            .insert(name.to_string(), message.to_string());
    }

    pub fn delay_next_list(&self, d: Duration) {
        self.lock().list_delay = Some(d);
    }

    pub fn delay_adds(&self, d: Duration) {
        self.lock().add_delay = Some(d);
    }

    pub fn delay_next_convert(&self, d: Duration) {
        self.lock().convert_delay = Some(d);
    }

    pub fn set_cpu_count(&self, n: usize) {
        self.lock().cpu_count = n;
    }

    pub fn set_exif(&self, exif: Option<ExifData>) {
        self.lock().exif = exif;
    }

    pub fn mark_converting(&self, id: &str, on: bool) {
        let mut inner = self.lock();
        if on {
            inner.converting.insert(id.to_string());
        } else {
            inner.converting.remove(id);
        }
    }

    pub fn mark_converted(&self, id: &str, path: &str) {
        if let Some(f) = self.lock().files.iter_mut().find(|f| f.id == id) {
            f.converted = true;
            f.converted_path = Some(path.to_string());
        }
    }

    /// Add a file behind the core's back (another window, another caller).
    pub fn insert_direct(&self, path: &str) -> FileEntry {
        let mut inner = self.lock();
        let entry = new_entry(&mut inner, SourceDescriptor::Path(path.to_string()));
        inner.files.push(entry.clone());
        entry
    }

    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.progress_tx.send(event);
    }

    /// Number of `get_file_list` calls so far.
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn add_calls(&self) -> Vec<String> {
        self.lock().add_calls.clone()
    }

    pub fn requests(&self) -> Vec<ConversionRequest> {
        self.lock().requests.clone()
    }

    pub fn saved(&self) -> Vec<(String, String)> {
        self.lock().saved.clone()
    }

    fn take_failure(&self, op: &'static str) -> Result<(), BackendError> {
        match self.lock().failures.remove(op) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn new_entry(inner: &mut Inner, source: SourceDescriptor) -> FileEntry {
    inner.next_id += 1;
    let name = match &source {
        SourceDescriptor::Path(p) | SourceDescriptor::Url(p) => p
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("image")
            .to_string(),
    };
    let ext = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    FileEntry {
        id: format!("file-{}", inner.next_id),
        name,
        size: 1024,
        mime_type: format!("image/{}", ext),
        source,
        exif: None,
        converted: false,
        converted_path: None,
    }
}

fn progress(entry: &FileEntry, status: ProgressStatus) -> ProgressEvent {
    ProgressEvent {
        file_id: entry.id.clone(),
        file_name: entry.name.clone(),
        status,
        error_message: None,
        saved_path: None,
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_file_list(&self) -> Result<Vec<FileEntry>, BackendError> {
        self.take_failure("get_file_list")?;
        // Snapshot first: a delayed response carries the state of the moment it was taken.
        let (files, delay) = {
            let mut inner = self.lock();
            inner.list_calls += 1;
            (inner.files.clone(), inner.list_delay.take())
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        Ok(files)
    }

    async fn add_file_from_path(&self, path: &str) -> Result<FileEntry, BackendError> {
        let delay = {
            let mut inner = self.lock();
            inner.add_calls.push(path.to_string());
            inner.add_delay
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.take_failure("add_file_from_path")?;
        let mut inner = self.lock();
        if inner
            .files
            .iter()
            .any(|f| f.source.path() == Some(path) && !f.converted)
        {
            return Err(BackendError::Duplicate(path.to_string()));
        }
        let entry = new_entry(&mut inner, SourceDescriptor::Path(path.to_string()));
        inner.files.push(entry.clone());
        Ok(entry)
    }

    async fn add_file_from_url(&self, url: &str) -> Result<FileEntry, BackendError> {
        self.lock().add_calls.push(url.to_string());
        self.take_failure("add_file_from_url")?;
        let mut inner = self.lock();
        let entry = new_entry(&mut inner, SourceDescriptor::Url(url.to_string()));
        inner.files.push(entry.clone());
        Ok(entry)
    }

    async fn remove_file(&self, id: &str) -> Result<(), BackendError> {
        self.take_failure("remove_file")?;
        let mut inner = self.lock();
        if inner.converting.contains(id) {
            return Err(BackendError::Busy(id.to_string()));
        }
        let before = inner.files.len();
        inner.files.retain(|f| f.id != id);
        if inner.files.len() == before {
            return Err(BackendError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn clear_files(&self) -> Result<(), BackendError> {
        self.take_failure("clear_files")?;
        let mut inner = self.lock();
        let converting = inner.converting.clone();
        inner.files.retain(|f| converting.contains(&f.id));
        Ok(())
    }

    async fn remove_converted_files(&self) -> Result<(), BackendError> {
        self.take_failure("remove_converted_files")?;
        self.lock().files.retain(|f| !f.converted);
        Ok(())
    }

    async fn convert_images(
        &self,
        request: &ConversionRequest,
    ) -> Result<Vec<ConversionResult>, BackendError> {
        let delay = {
            let mut inner = self.lock();
            inner.requests.push(request.clone());
            inner.convert_delay.take()
        };
        self.take_failure("convert_images")?;
        let pending: Vec<FileEntry> = self
            .lock()
            .files
            .iter()
            .filter(|f| !f.converted)
            .cloned()
            .collect();
        if pending.is_empty() {
            return Err(BackendError::Other(
                "No files to convert (all files already converted)".to_string(),
            ));
        }

        for f in &pending {
            self.mark_converting(&f.id, true);
            self.emit(progress(f, ProgressStatus::Converting));
        }
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let mut results = Vec::new();
        for f in &pending {
            self.mark_converting(&f.id, false);
            let failure = self.lock().failing_names.get(&f.name).cloned();
            if let Some(message) = failure {
                let mut ev = progress(f, ProgressStatus::Error);
                ev.error_message = Some(message);
                self.emit(ev);
                continue;
            }
            let stem = Path::new(&f.name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            let converted_name = format!("{}.{}", stem, request.target_format.extension());
            let dir = match &request.output_dir {
                OutputTarget::Directory(d) => d.clone(),
                OutputTarget::SourceDirectory => f
                    .source
                    .path()
                    .and_then(|p| Path::new(p).parent())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("/downloads")),
            };
            let saved_path = dir.join(&converted_name).to_string_lossy().into_owned();
            self.mark_converted(&f.id, &saved_path);
            let mut ev = progress(f, ProgressStatus::Completed);
            ev.saved_path = Some(saved_path.clone());
            self.emit(ev);
            results.push(ConversionResult {
                original_name: f.name.clone(),
                converted_name,
                original_size: f.size,
                converted_size: f.size / 2,
                saved_path,
            });
        }
        Ok(results)
    }

    async fn save_file(&self, id: &str, save_path: &str) -> Result<(), BackendError> {
        self.take_failure("save_file")?;
        let mut inner = self.lock();
        if !inner.files.iter().any(|f| f.id == id) {
            return Err(BackendError::NotFound(id.to_string()));
        }
        inner.saved.push((id.to_string(), save_path.to_string()));
        Ok(())
    }

    async fn get_cpu_count(&self) -> Result<usize, BackendError> {
        self.take_failure("get_cpu_count")?;
        Ok(self.lock().cpu_count)
    }

    async fn extract_exif(&self, _data: &[u8]) -> Result<Option<ExifData>, BackendError> {
        self.take_failure("extract_exif")?;
        Ok(self.lock().exif.clone())
    }

    fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }
}

/// Dialogs that return whatever the test queued; `None` plays a cancel.
#[derive(Default)]
pub struct ScriptedDialogs {
    directory: Mutex<Option<PathBuf>>,
    files: Mutex<Option<Vec<PathBuf>>>,
    save_path: Mutex<Option<PathBuf>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_directory(&self, dir: Option<&str>) {
        *self.directory.lock().unwrap() = dir.map(PathBuf::from);
    }

    pub fn answer_files(&self, files: Option<Vec<&str>>) {
        *self.files.lock().unwrap() = files.map(|v| v.into_iter().map(PathBuf::from).collect());
    }

    pub fn answer_save_path(&self, path: Option<&str>) {
        *self.save_path.lock().unwrap() = path.map(PathBuf::from);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dialogs for ScriptedDialogs {
    async fn pick_directory(&self) -> Option<PathBuf> {
        self.calls.lock().unwrap().push("pick_directory");
        self.directory.lock().unwrap().clone()
    }

    async fn pick_files(&self, _extensions: &[&str]) -> Option<Vec<PathBuf>> {
        self.calls.lock().unwrap().push("pick_files");
        self.files.lock().unwrap().clone()
    }

    async fn pick_save_path(&self, _default_name: &str) -> Option<PathBuf> {
        self.calls.lock().unwrap().push("pick_save_path");
        self.save_path.lock().unwrap().clone()
    }
}

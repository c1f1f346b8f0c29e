use super::manager;
use super::model::{ConversionSettings, ImageFormat, AVIF_SPEED_RANGE};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

enum FlushMsg {
    Write(ConversionSettings),
    Sync(mpsc::Sender<()>),
}

/// Process-wide conversion settings.
///
/// Setters replace one field and return immediately; the new snapshot is
/// written to disk by a background writer thread. A failed write is logged
/// and otherwise ignored: the in-memory value stays authoritative.
pub struct SettingsStore {
    current: RwLock<ConversionSettings>,
    flush_tx: Option<Mutex<mpsc::Sender<FlushMsg>>>,
}

impl SettingsStore {
    /// Settings that are never persisted.
    pub fn in_memory(initial: ConversionSettings) -> Self {
        SettingsStore {
            current: RwLock::new(initial),
            flush_tx: None,
        }
    }

    /// Load settings from `home` and persist every later change there.
    pub fn open(home: PathBuf) -> Self {
        let initial = manager::read_settings(&home).unwrap_or_else(|e| {
            tracing::warn!("settings: cannot read {}: {:#}", home.display(), e);
            ConversionSettings::default()
        });

        let (tx, rx) = mpsc::channel::<FlushMsg>();
        std::thread::spawn(move || run_writer(home, rx));

        SettingsStore {
            current: RwLock::new(initial),
            flush_tx: Some(Mutex::new(tx)),
        }
    }

    pub fn get(&self) -> ConversionSettings {
        self.read().clone()
    }

    pub fn set_target_format(&self, format: ImageFormat) {
        self.update(|s| s.target_format = format);
    }

    pub fn set_quality_for_format(&self, format: ImageFormat, value: u8) {
        let value = format.clamp_quality(value);
        self.update(|s| {
            s.quality_by_format.insert(format, value);
        });
    }

    pub fn set_avif_speed(&self, value: u8) {
        let value = value.clamp(*AVIF_SPEED_RANGE.start(), *AVIF_SPEED_RANGE.end());
        self.update(|s| s.avif_speed = value);
    }

    pub fn set_preserve_exif(&self, value: bool) {
        self.update(|s| s.preserve_exif = value);
    }

    pub fn set_preserve_timestamps(&self, value: bool) {
        self.update(|s| s.preserve_timestamps = value);
    }

    pub fn set_use_source_directory(&self, value: bool) {
        self.update(|s| s.use_source_directory = value);
    }

    pub fn set_create_subfolder(&self, value: bool) {
        self.update(|s| s.create_subfolder = value);
    }

    pub fn set_subfolder_name(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|s| s.subfolder_name = value);
    }

    pub fn set_url_files_fallback_directory(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|s| s.url_files_fallback_directory = value);
    }

    pub fn set_max_concurrent_conversions(&self, value: usize) {
        self.update(|s| s.max_concurrent_conversions = value);
    }

    /// Restore compiled-in defaults in a single write.
    pub fn reset(&self) {
        self.update(|s| *s = ConversionSettings::default());
    }

    /// Block until every queued write has reached disk.
    pub fn sync(&self) {
        let Some(tx) = &self.flush_tx else {
            return;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        let sent = tx
            .lock()
            .map(|tx| tx.send(FlushMsg::Sync(ack_tx)).is_ok())
            .unwrap_or(false);
        if sent {
            let _ = ack_rx.recv();
        }
    }

    fn update(&self, f: impl FnOnce(&mut ConversionSettings)) {
        let mut guard = self.write();
        f(&mut *guard);
        // queued under the write lock so snapshots reach the writer in order
        self.schedule_flush(guard.clone());
    }

    fn schedule_flush(&self, snapshot: ConversionSettings) {
        let Some(tx) = &self.flush_tx else {
            return;
        };
        match tx.lock() {
            Ok(tx) => {
                if tx.send(FlushMsg::Write(snapshot)).is_err() {
                    tracing::warn!("settings: writer thread is gone, change not persisted");
                }
            }
            Err(_) => tracing::warn!("settings: flush channel lock poisoned"),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ConversionSettings> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConversionSettings> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        SettingsStore::in_memory(ConversionSettings::default())
    }
}

/// Writes only the newest snapshot of each burst.
fn run_writer(home: PathBuf, rx: mpsc::Receiver<FlushMsg>) {
    while let Ok(msg) = rx.recv() {
        let mut latest = None;
        let mut acks = Vec::new();
        for msg in std::iter::once(msg).chain(rx.try_iter()) {
            match msg {
                FlushMsg::Write(s) => latest = Some(s),
                FlushMsg::Sync(ack) => acks.push(ack),
            }
        }
        if let Some(settings) = latest {
            match manager::write_settings(&home, &settings) {
                Ok(()) => tracing::debug!("settings: flushed to {}", home.display()),
                Err(e) => tracing::warn!("settings: flush failed: {:#}", e),
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
}

use crate::settings::model::ImageFormat;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

pub type FileId = String;

/// Literal the engine understands as "write next to each source file".
/// Never absolute, so it cannot collide with a path returned by the picker.
pub const SOURCE_DIR_SENTINEL: &str = "USE_SOURCE_DIR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifData {
    pub date_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub iso: Option<String>,
    pub shutter_speed: Option<String>,
    pub aperture: Option<String>,
    pub focal_length: Option<String>,
    pub orientation: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub gps_latitude: Option<String>,
    pub gps_longitude: Option<String>,
}

impl ExifData {
    /// Capture time parsed from the EXIF `YYYY:MM:DD HH:MM:SS` string.
    pub fn capture_time(&self) -> Option<chrono::NaiveDateTime> {
        parse_exif_datetime(self.date_time.as_deref()?)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }

    pub fn has_gps(&self) -> bool {
        self.gps_latitude.is_some() && self.gps_longitude.is_some()
    }
}

pub fn parse_exif_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    // "2024:03:15 12:30:45" → "2024-03-15 12:30:45"
    let date = s.get(..10)?.replace(':', "-");
    let normalized = format!("{} {}", date, s.get(11..19)?);
    chrono::NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()
}

/// Where a tracked file came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceDescriptor {
    Path(String),
    Url(String),
}

impl SourceDescriptor {
    pub fn path(&self) -> Option<&str> {
        match self {
            SourceDescriptor::Path(p) => Some(p),
            SourceDescriptor::Url(_) => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            SourceDescriptor::Url(u) => Some(u),
            SourceDescriptor::Path(_) => None,
        }
    }
}

/// One file as the engine reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FileEntryWire", into = "FileEntryWire")]
pub struct FileEntry {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub source: SourceDescriptor,
    pub exif: Option<ExifData>,
    pub converted: bool,
    /// Only set when `converted` is true.
    pub converted_path: Option<String>,
}

impl FileEntry {
    pub fn is_url_sourced(&self) -> bool {
        matches!(self.source, SourceDescriptor::Url(_))
    }
}

/// IPC shape: provenance travels as two optional fields.
#[derive(Serialize, Deserialize)]
struct FileEntryWire {
    id: String,
    name: String,
    size: u64,
    mime_type: String,
    #[serde(default)]
    source_path: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    exif: Option<ExifData>,
    #[serde(default)]
    converted: bool,
    #[serde(default)]
    converted_path: Option<String>,
}

impl TryFrom<FileEntryWire> for FileEntry {
    type Error = String;

    fn try_from(w: FileEntryWire) -> Result<Self, Self::Error> {
        let source = match (w.source_path, w.source_url) {
            (Some(p), None) => SourceDescriptor::Path(p),
            (None, Some(u)) => SourceDescriptor::Url(u),
            (Some(_), Some(_)) => {
                return Err(format!("file {} has both a source path and a source URL", w.id))
            }
            (None, None) => return Err(format!("file {} has no source", w.id)),
        };
        Ok(FileEntry {
            id: w.id,
            name: w.name,
            size: w.size,
            mime_type: w.mime_type,
            source,
            exif: w.exif,
            converted: w.converted,
            converted_path: if w.converted { w.converted_path } else { None },
        })
    }
}

impl From<FileEntry> for FileEntryWire {
    fn from(e: FileEntry) -> Self {
        let (source_path, source_url) = match e.source {
            SourceDescriptor::Path(p) => (Some(p), None),
            SourceDescriptor::Url(u) => (None, Some(u)),
        };
        FileEntryWire {
            id: e.id,
            name: e.name,
            size: e.size,
            mime_type: e.mime_type,
            source_path,
            source_url,
            exif: e.exif,
            converted: e.converted,
            converted_path: e.converted_path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Converting,
    Completed,
    Error,
    Skipped,
}

/// Payload of the `conversion-progress` event, one per file transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub file_id: FileId,
    pub file_name: String,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_path: Option<String>,
}

/// Destination for converted files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    SourceDirectory,
    Directory(PathBuf),
}

impl OutputTarget {
    pub fn as_wire(&self) -> String {
        match self {
            OutputTarget::SourceDirectory => SOURCE_DIR_SENTINEL.to_string(),
            OutputTarget::Directory(p) => p.to_string_lossy().into_owned(),
        }
    }

    pub fn from_wire(s: &str) -> Self {
        if s == SOURCE_DIR_SENTINEL {
            OutputTarget::SourceDirectory
        } else {
            OutputTarget::Directory(Path::new(s).to_path_buf())
        }
    }
}

impl Serialize for OutputTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_wire())
    }
}

impl<'de> Deserialize<'de> for OutputTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(OutputTarget::from_wire(&s))
    }
}

/// Arguments of the engine's `convert_images` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub target_format: ImageFormat,
    pub quality: u8,
    pub avif_speed: u8,
    pub preserve_exif: bool,
    pub preserve_timestamps: bool,
    pub output_dir: OutputTarget,
    /// Already resolved; never 0.
    pub max_concurrent: usize,
    pub create_subfolder: bool,
    pub subfolder_name: String,
    pub url_files_fallback_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub original_name: String,
    pub converted_name: String,
    pub original_size: u64,
    pub converted_size: u64,
    pub saved_path: String,
}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Webp,
    Jpeg,
    Png,
    Avif,
    Gif,
    Bmp,
    Tiff,
    /// Makes the engine fail every file; for exercising error paths.
    Error,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 8] = [
        ImageFormat::Webp,
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Avif,
        ImageFormat::Gif,
        ImageFormat::Bmp,
        ImageFormat::Tiff,
        ImageFormat::Error,
    ];

    /// Formats offered to the user. The diagnostic format only exists in debug builds.
    pub fn selectable() -> Vec<ImageFormat> {
        ImageFormat::ALL
            .into_iter()
            .filter(|f| *f != ImageFormat::Error || cfg!(debug_assertions))
            .collect()
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Webp => "webp",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Avif => "avif",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Error => "error",
        }
    }

    /// Valid quality values: 0–100 for lossy encoders, a 0–9 compression level for PNG.
    pub fn quality_range(&self) -> RangeInclusive<u8> {
        match self {
            ImageFormat::Png => 0..=9,
            _ => 0..=100,
        }
    }

    pub fn default_quality(&self) -> u8 {
        match self {
            ImageFormat::Webp | ImageFormat::Jpeg | ImageFormat::Avif => 80,
            ImageFormat::Png => 6,
            ImageFormat::Gif | ImageFormat::Bmp | ImageFormat::Tiff | ImageFormat::Error => 0,
        }
    }

    pub fn clamp_quality(&self, value: u8) -> u8 {
        let range = self.quality_range();
        value.clamp(*range.start(), *range.end())
    }
}

pub const AVIF_SPEED_RANGE: RangeInclusive<u8> = 1..=10;

/// Key the settings are stored under inside the settings file.
pub const SETTINGS_NAMESPACE: &str = "conversion-settings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSettings {
    pub target_format: ImageFormat,
    pub quality_by_format: BTreeMap<ImageFormat, u8>,
    pub avif_speed: u8,
    pub preserve_exif: bool,
    pub preserve_timestamps: bool,
    pub use_source_directory: bool,
    /// Only applies with `use_source_directory`.
    pub create_subfolder: bool,
    pub subfolder_name: String,
    /// Empty means the engine falls back to the Downloads folder.
    pub url_files_fallback_directory: String,
    /// 0 = auto (one per reported CPU core).
    pub max_concurrent_conversions: usize,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        ConversionSettings {
            target_format: ImageFormat::Webp,
            quality_by_format: ImageFormat::ALL
                .into_iter()
                .map(|f| (f, f.default_quality()))
                .collect(),
            avif_speed: 6,
            preserve_exif: true,
            preserve_timestamps: true,
            use_source_directory: false,
            create_subfolder: false,
            subfolder_name: "converted".to_string(),
            url_files_fallback_directory: String::new(),
            max_concurrent_conversions: 0,
        }
    }
}

impl ConversionSettings {
    pub fn quality_for(&self, format: ImageFormat) -> u8 {
        self.quality_by_format
            .get(&format)
            .copied()
            .unwrap_or_else(|| format.default_quality())
    }

    /// Quality for the currently selected target format.
    pub fn resolved_quality(&self) -> u8 {
        self.quality_for(self.target_format)
    }

    pub fn effective_concurrency(&self, cpu_count: usize) -> usize {
        if self.max_concurrent_conversions == 0 {
            cpu_count.max(1)
        } else {
            self.max_concurrent_conversions
        }
    }

    /// Text for the concurrency control, e.g. `Auto (8)` or `4`.
    pub fn concurrency_label(&self, cpu_count: usize) -> String {
        if self.max_concurrent_conversions == 0 {
            format!("Auto ({})", cpu_count)
        } else {
            self.max_concurrent_conversions.to_string()
        }
    }

    /// Build settings from a persisted object, field by field.
    ///
    /// Missing or ill-typed fields keep their defaults, so payloads written by
    /// older or newer versions still load.
    pub fn from_persisted(value: &serde_json::Value) -> Self {
        let mut s = ConversionSettings::default();
        let Some(obj) = value.as_object() else {
            tracing::warn!("settings: persisted value is not an object, using defaults");
            return s;
        };

        merge_field(obj, "targetFormat", &mut s.target_format);
        merge_field(obj, "avifSpeed", &mut s.avif_speed);
        merge_field(obj, "preserveExif", &mut s.preserve_exif);
        merge_field(obj, "preserveTimestamps", &mut s.preserve_timestamps);
        merge_field(obj, "useSourceDirectory", &mut s.use_source_directory);
        merge_field(obj, "createSubfolder", &mut s.create_subfolder);
        merge_field(obj, "subfolderName", &mut s.subfolder_name);
        merge_field(obj, "urlFilesFallbackDirectory", &mut s.url_files_fallback_directory);
        merge_field(obj, "maxConcurrentConversions", &mut s.max_concurrent_conversions);

        if let Some(qualities) = obj.get("qualityByFormat").and_then(|q| q.as_object()) {
            for format in ImageFormat::ALL {
                if let Some(slot) = s.quality_by_format.get_mut(&format) {
                    merge_field(qualities, format.extension(), slot);
                    *slot = format.clamp_quality(*slot);
                }
            }
        }
        s.avif_speed = s
            .avif_speed
            .clamp(*AVIF_SPEED_RANGE.start(), *AVIF_SPEED_RANGE.end());
        s
    }
}

fn merge_field<T: DeserializeOwned>(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = obj.get(key) else {
        return;
    };
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(v) => *slot = v,
        Err(e) => tracing::warn!("settings: ignoring field {}: {}", key, e),
    }
}

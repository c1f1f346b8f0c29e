use super::model::{ConversionSettings, SETTINGS_NAMESPACE};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";

/// Per-user settings directory, e.g. ~/.config/image-converter
pub fn settings_home() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("image-converter"))
}

pub fn settings_path(home: &Path) -> PathBuf {
    home.join(SETTINGS_FILE)
}

/// Load settings from `<home>/settings.json`.
/// A missing file, unparsable JSON or a missing namespace all yield defaults.
pub fn read_settings(home: &Path) -> Result<ConversionSettings> {
    let path = settings_path(home);
    if !path.exists() {
        return Ok(ConversionSettings::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let root: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("settings: {} is not valid JSON ({}), using defaults", path.display(), e);
            return Ok(ConversionSettings::default());
        }
    };
    Ok(root
        .get(SETTINGS_NAMESPACE)
        .map(ConversionSettings::from_persisted)
        .unwrap_or_default())
}

/// Write settings under their namespace, keeping any other keys in the file.
pub fn write_settings(home: &Path, settings: &ConversionSettings) -> Result<()> {
    std::fs::create_dir_all(home)
        .with_context(|| format!("creating {}", home.display()))?;
    let path = settings_path(home);

    let mut root = std::fs::read_to_string(&path)
        .ok()
        .and_then(|t| serde_json::from_str::<serde_json::Value>(&t).ok())
        .filter(|v| v.is_object())
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    if let Some(obj) = root.as_object_mut() {
        obj.insert(SETTINGS_NAMESPACE.to_string(), serde_json::to_value(settings)?);
    }

    let tmp = home.join(format!("{}.tmp", SETTINGS_FILE));
    std::fs::write(&tmp, serde_json::to_string_pretty(&root)?)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

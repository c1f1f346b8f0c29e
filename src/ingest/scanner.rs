use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the picker offers and dropped folders are filtered by.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "heic", "avif", "tif", "tiff",
];

/// True if the file extension is a supported image type (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Turn raw input paths into the distinct files to add, in input order.
///
/// Directories are walked recursively and contribute their supported images;
/// symlinks inside them are skipped. Plain paths are passed through untouched
/// so the engine can report its own error for unreadable or unsupported files.
pub fn collect_files(inputs: &[PathBuf]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = Vec::new();
            for entry in WalkDir::new(input)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| !e.path_is_symlink())
            {
                match entry {
                    Err(e) => tracing::warn!("ingest: scan error: {}", e),
                    Ok(entry) => {
                        if entry.file_type().is_file() && is_supported_image(entry.path()) {
                            found.push(entry.into_path());
                        }
                    }
                }
            }
            found.sort();
            tracing::debug!("ingest: {:?} expanded to {} files", input, found.len());
            for p in found {
                push_unique(&mut seen, &mut out, p);
            }
        } else {
            push_unique(&mut seen, &mut out, input.clone());
        }
    }
    out
}

fn push_unique(seen: &mut HashSet<String>, out: &mut Vec<String>, path: PathBuf) {
    let s = path.to_string_lossy().into_owned();
    if seen.insert(s.clone()) {
        out.push(s);
    }
}

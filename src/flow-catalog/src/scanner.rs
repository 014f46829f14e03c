//! Recursive directory scanning for video files
//!
//! All-or-nothing per root: one unreadable subdirectory fails the
//! whole scan rather than returning a silently partial listing.
//! Symlinks are not followed, so loops cannot occur.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::CatalogError;

/// File extensions the catalog ingests, compared case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv"];

/// True when the path carries one of the recognized video extensions.
pub fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            VIDEO_EXTENSIONS.iter().any(|v| *v == e)
        })
        .unwrap_or(false)
}

/// Recursively enumerate every video file under `root`, returning a
/// flat, deduplicated path list. Does not consult the catalog; the
/// caller feeds the result through admission.
pub fn scan(root: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    debug!("scanning {:?}", root);

    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| CatalogError::Scan {
            path: root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if !has_video_extension(&path) {
            continue;
        }
        if seen.insert(path.to_string_lossy().to_lowercase()) {
            found.push(path);
        }
    }

    debug!("scan of {:?} found {} video files", root, found.len());
    Ok(found)
}

//! Catalog record types
//!
//! Field names serialize as camelCase so the on-disk document stays
//! readable alongside the rest of the Flow tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Processing lifecycle of a catalog entry.
///
/// `pending -> processing -> {completed | error}`; terminal states are
/// only left again through an explicit regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// Container/stream metadata captured by the media prober.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    /// Bits per second
    pub bitrate: u64,
}

/// One catalog entry per distinct file path (case-insensitive identity).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    /// Immutable identifier assigned at creation
    pub id: String,
    /// Absolute filesystem path; the deduplication key
    pub path: String,
    /// Display name derived from the path at creation time
    pub filename: String,
    pub added_at: DateTime<Utc>,
    /// Byte size captured at creation time, not re-validated later
    pub file_size: u64,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default)]
    pub last_played_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    pub processing_status: ProcessingStatus,
    /// 0-100, meaningful only while `processing`
    #[serde(default)]
    pub processing_progress: u8,
    #[serde(default)]
    pub metadata: Option<VideoMetadata>,
    /// Generated frame images, in timestamp order
    #[serde(default)]
    pub thumbnails: Vec<String>,
}

impl VideoEntry {
    /// Create a fresh entry for a newly admitted path.
    pub fn new(path: &Path, file_size: u64) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Self {
            id: Uuid::new_v4().to_string(),
            path: path.to_string_lossy().into_owned(),
            filename,
            added_at: Utc::now(),
            file_size,
            play_count: 0,
            last_played_at: None,
            is_favorite: false,
            tag_ids: Vec::new(),
            processing_status: ProcessingStatus::Pending,
            processing_progress: 0,
            metadata: None,
            thumbnails: Vec::new(),
        }
    }

    /// Case-insensitive form of the path, used as the dedup key.
    pub fn path_key(&self) -> String {
        self.path.to_lowercase()
    }
}

/// A directory under continuous monitoring for new video files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFolder {
    pub id: String,
    pub path: String,
    pub added_at: DateTime<Utc>,
}

impl WatchFolder {
    pub fn new(path: &Path) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: path.to_string_lossy().into_owned(),
            added_at: Utc::now(),
        }
    }
}

/// User-defined label, referenced from entries by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Tag {
    pub fn new(name: &str, color: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            color: color.to_string(),
        }
    }
}

/// Thumbnail generation parameters, read by the pipeline at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailSettings {
    /// Number of frames to extract per video
    pub max_count: u32,
    /// JPEG quality as a 1-100 percentage
    pub quality: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            max_count: 20,
            quality: 80,
            width: 320,
            height: 180,
        }
    }
}

/// Process-wide settings collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub thumbnails: ThumbnailSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn new_entry_starts_pending() {
        let entry = VideoEntry::new(&PathBuf::from("/videos/Clip.MP4"), 1024);
        assert_eq!(entry.filename, "Clip.MP4");
        assert_eq!(entry.processing_status, ProcessingStatus::Pending);
        assert_eq!(entry.processing_progress, 0);
        assert!(entry.thumbnails.is_empty());
        assert_eq!(entry.path_key(), "/videos/clip.mp4");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ProcessingStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn entry_serializes_camel_case() {
        let entry = VideoEntry::new(&PathBuf::from("/videos/a.mp4"), 7);
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("processingStatus").is_some());
        assert!(value.get("fileSize").is_some());
        assert!(value.get("addedAt").is_some());
    }
}

//! flow-store - Catalog persistence for Flow
//!
//! Holds the four catalog collections (videos, watch folders, tags,
//! settings) in a single JSON document and provides atomic
//! read-modify-write per operation. Single process, single writer:
//! every mutation happens under one lock and is flushed to disk via
//! temp-file + rename before the lock is released.

mod error;
mod models;

pub use error::StoreError;
pub use models::*;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// On-disk document name, matching the original catalog file.
const STORE_FILE: &str = "flow-data.json";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoreData {
    videos: Vec<VideoEntry>,
    watch_folders: Vec<WatchFolder>,
    tags: Vec<Tag>,
    settings: Settings,
}

/// Durable key-value catalog store.
pub struct Store {
    path: Option<PathBuf>,
    data: Mutex<StoreData>,
}

impl Store {
    /// Open or create the catalog document under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(STORE_FILE);

        let data = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            StoreData::default()
        };

        info!("catalog store opened at {:?}", path);
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    /// Ephemeral store for tests; never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(StoreData::default()),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&StoreData) -> T) -> Result<T, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&data))
    }

    /// Apply a mutation and flush the document before releasing the lock.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut StoreData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        let result = f(&mut data)?;
        self.persist(&data)?;
        Ok(result)
    }

    fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        debug!("catalog flushed to {:?}", path);
        Ok(())
    }

    // --- videos ---

    pub fn videos(&self) -> Result<Vec<VideoEntry>, StoreError> {
        self.read(|d| d.videos.clone())
    }

    pub fn video(&self, id: &str) -> Result<Option<VideoEntry>, StoreError> {
        self.read(|d| d.videos.iter().find(|v| v.id == id).cloned())
    }

    /// Append a batch of freshly admitted entries as one atomic write.
    pub fn append_videos(&self, entries: &[VideoEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.write(|d| {
            d.videos.extend_from_slice(entries);
            Ok(())
        })
    }

    /// Patch a single entry in place, returning the updated record.
    pub fn update_video(
        &self,
        id: &str,
        patch: impl FnOnce(&mut VideoEntry),
    ) -> Result<VideoEntry, StoreError> {
        self.write(|d| {
            let entry = d
                .videos
                .iter_mut()
                .find(|v| v.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("video {id}")))?;
            patch(entry);
            Ok(entry.clone())
        })
    }

    /// Remove an entry, returning it so the caller can clean up
    /// generated thumbnail files.
    pub fn remove_video(&self, id: &str) -> Result<VideoEntry, StoreError> {
        self.write(|d| {
            let idx = d
                .videos
                .iter()
                .position(|v| v.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("video {id}")))?;
            Ok(d.videos.remove(idx))
        })
    }

    pub fn mark_played(&self, id: &str) -> Result<VideoEntry, StoreError> {
        self.update_video(id, |v| {
            v.play_count += 1;
            v.last_played_at = Some(chrono::Utc::now());
        })
    }

    pub fn set_favorite(&self, id: &str, favorite: bool) -> Result<VideoEntry, StoreError> {
        self.update_video(id, |v| v.is_favorite = favorite)
    }

    // --- watch folders ---

    pub fn watch_folders(&self) -> Result<Vec<WatchFolder>, StoreError> {
        self.read(|d| d.watch_folders.clone())
    }

    /// Register a folder for watching. Returns `None` when the exact
    /// path is already registered.
    pub fn add_watch_folder(&self, path: &Path) -> Result<Option<WatchFolder>, StoreError> {
        self.write(|d| {
            let raw = path.to_string_lossy().into_owned();
            if d.watch_folders.iter().any(|f| f.path == raw) {
                return Ok(None);
            }
            let folder = WatchFolder::new(path);
            d.watch_folders.push(folder.clone());
            Ok(Some(folder))
        })
    }

    pub fn remove_watch_folder(&self, id: &str) -> Result<WatchFolder, StoreError> {
        self.write(|d| {
            let idx = d
                .watch_folders
                .iter()
                .position(|f| f.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("watch folder {id}")))?;
            Ok(d.watch_folders.remove(idx))
        })
    }

    // --- tags ---

    pub fn tags(&self) -> Result<Vec<Tag>, StoreError> {
        self.read(|d| d.tags.clone())
    }

    pub fn add_tag(&self, name: &str, color: &str) -> Result<Tag, StoreError> {
        self.write(|d| {
            let tag = Tag::new(name, color);
            d.tags.push(tag.clone());
            Ok(tag)
        })
    }

    /// Delete a tag and cascade the removal through every entry's
    /// `tagIds`, so no dangling references remain.
    pub fn remove_tag(&self, id: &str) -> Result<Tag, StoreError> {
        self.write(|d| {
            let idx = d
                .tags
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("tag {id}")))?;
            let tag = d.tags.remove(idx);
            for video in &mut d.videos {
                video.tag_ids.retain(|t| t != id);
            }
            Ok(tag)
        })
    }

    pub fn tag_video(&self, video_id: &str, tag_id: &str) -> Result<VideoEntry, StoreError> {
        self.write(|d| {
            if !d.tags.iter().any(|t| t.id == tag_id) {
                return Err(StoreError::NotFound(format!("tag {tag_id}")));
            }
            let entry = d
                .videos
                .iter_mut()
                .find(|v| v.id == video_id)
                .ok_or_else(|| StoreError::NotFound(format!("video {video_id}")))?;
            if !entry.tag_ids.iter().any(|t| t == tag_id) {
                entry.tag_ids.push(tag_id.to_string());
            }
            Ok(entry.clone())
        })
    }

    pub fn untag_video(&self, video_id: &str, tag_id: &str) -> Result<VideoEntry, StoreError> {
        self.update_video(video_id, |v| v.tag_ids.retain(|t| t != tag_id))
    }

    // --- settings ---

    pub fn settings(&self) -> Result<Settings, StoreError> {
        self.read(|d| d.settings.clone())
    }

    pub fn set_thumbnail_settings(&self, thumbnails: ThumbnailSettings) -> Result<(), StoreError> {
        self.write(|d| {
            d.settings.thumbnails = thumbnails;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(path: &str) -> VideoEntry {
        VideoEntry::new(&PathBuf::from(path), 42)
    }

    #[test]
    fn append_and_update_video() {
        let store = Store::in_memory();
        let e = entry("/v/a.mp4");
        store.append_videos(&[e.clone()]).unwrap();

        let updated = store
            .update_video(&e.id, |v| {
                v.processing_status = ProcessingStatus::Completed;
                v.processing_progress = 100;
            })
            .unwrap();
        assert_eq!(updated.processing_status, ProcessingStatus::Completed);
        assert_eq!(store.videos().unwrap().len(), 1);
    }

    #[test]
    fn update_missing_video_is_not_found() {
        let store = Store::in_memory();
        let err = store.update_video("nope", |_| {}).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn tag_deletion_cascades_to_entries() {
        let store = Store::in_memory();
        let tag = store.add_tag("family", "#ff0000").unwrap();
        let entries = [entry("/v/a.mp4"), entry("/v/b.mp4"), entry("/v/c.mp4")];
        store.append_videos(&entries).unwrap();
        for e in &entries {
            store.tag_video(&e.id, &tag.id).unwrap();
        }

        store.remove_tag(&tag.id).unwrap();

        assert!(store.tags().unwrap().is_empty());
        for v in store.videos().unwrap() {
            assert!(v.tag_ids.is_empty());
        }
    }

    #[test]
    fn tagging_with_unknown_tag_fails() {
        let store = Store::in_memory();
        let e = entry("/v/a.mp4");
        store.append_videos(&[e.clone()]).unwrap();
        let err = store.tag_video(&e.id, "ghost").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn duplicate_watch_folder_is_rejected() {
        let store = Store::in_memory();
        let path = PathBuf::from("/videos");
        assert!(store.add_watch_folder(&path).unwrap().is_some());
        assert!(store.add_watch_folder(&path).unwrap().is_none());
        assert_eq!(store.watch_folders().unwrap().len(), 1);
    }

    #[test]
    fn play_and_favorite_updates() {
        let store = Store::in_memory();
        let e = entry("/v/a.mp4");
        store.append_videos(&[e.clone()]).unwrap();

        store.mark_played(&e.id).unwrap();
        let v = store.mark_played(&e.id).unwrap();
        assert_eq!(v.play_count, 2);
        assert!(v.last_played_at.is_some());

        let v = store.set_favorite(&e.id, true).unwrap();
        assert!(v.is_favorite);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = Store::open(dir.path()).unwrap();
            store.append_videos(&[entry("/v/a.mp4")]).unwrap();
            store.add_tag("demo", "#00ff00").unwrap();
            store.add_watch_folder(&PathBuf::from("/videos")).unwrap();
            store
                .set_thumbnail_settings(ThumbnailSettings {
                    max_count: 4,
                    ..Default::default()
                })
                .unwrap();
        }

        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.videos().unwrap().len(), 1);
        assert_eq!(store.tags().unwrap().len(), 1);
        assert_eq!(store.watch_folders().unwrap().len(), 1);
        assert_eq!(store.settings().unwrap().thumbnails.max_count, 4);
    }
}

//! Watch-folder monitoring
//!
//! One filesystem watcher per registered folder. Activation is two
//! phase: the live watcher is registered first (its events buffer in
//! the channel), then a bootstrap scan captures pre-existing files, and
//! only then are live events drained; admission dedup makes the
//! overlap between the two phases safe. Failures are isolated per
//! folder; one dead watcher never takes down its siblings.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use flow_store::WatchFolder;

use crate::coordinator::IngestionCoordinator;
use crate::error::CatalogError;
use crate::scanner;

/// A file can arrive by being written in place or by being moved in;
/// the latter surfaces as a rename event, not a create.
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    )
}

struct WatchHandle {
    // kept alive for the duration of the watch; dropping it closes the
    // underlying notification stream
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

/// Manages the set of active folder watchers.
pub struct FolderWatchers {
    coordinator: IngestionCoordinator,
    active: Mutex<HashMap<String, WatchHandle>>,
}

impl FolderWatchers {
    pub fn new(coordinator: IngestionCoordinator) -> Self {
        Self {
            coordinator,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Start monitoring `folder`: bootstrap scan for pre-existing
    /// files, then continuous ingestion of created video files.
    pub async fn watch(&self, folder: &WatchFolder) -> Result<(), CatalogError> {
        if self.active.lock().unwrap().contains_key(&folder.id) {
            debug!("already watching {}", folder.path);
            return Ok(());
        }

        let root = PathBuf::from(&folder.path);
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        // live watcher first, so nothing created during the bootstrap
        // scan can slip between the two phases
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let scan_root = root.clone();
        let found = tokio::task::spawn_blocking(move || scanner::scan(&scan_root))
            .await
            .map_err(|e| CatalogError::Io(std::io::Error::other(e)))??;

        info!(
            "watching {} ({} pre-existing video file(s))",
            folder.path,
            found.len()
        );
        if !found.is_empty() {
            self.coordinator.ingest(&found).await?;
        }

        let coordinator = self.coordinator.clone();
        let folder_path = folder.path.clone();
        let task = tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(event) => {
                        if !is_arrival(&event.kind) {
                            continue;
                        }
                        let paths: Vec<PathBuf> = event
                            .paths
                            .into_iter()
                            .filter(|p| scanner::has_video_extension(p))
                            .collect();
                        if paths.is_empty() {
                            continue;
                        }
                        if let Err(e) = coordinator.ingest(&paths).await {
                            error!("watch ingestion failed under {}: {}", folder_path, e);
                        }
                    }
                    Err(e) => {
                        // isolated to this folder; siblings keep running
                        error!("watcher error for {}: {}", folder_path, e);
                    }
                }
            }
            debug!("watch stream for {} closed", folder_path);
        });

        self.active.lock().unwrap().insert(
            folder.id.clone(),
            WatchHandle {
                _watcher: watcher,
                task,
            },
        );
        Ok(())
    }

    /// Stop monitoring one folder. Already-ingested entries stay in the
    /// catalog.
    pub fn unwatch(&self, folder_id: &str) {
        if let Some(handle) = self.active.lock().unwrap().remove(folder_id) {
            handle.task.abort();
            info!("stopped watching folder {}", folder_id);
        }
    }

    /// (Re-)activate watchers for the given set, typically after the
    /// WatchFolder collection changed. Per-folder failures are logged
    /// and skipped.
    pub async fn watch_all(&self, folders: &[WatchFolder]) {
        for folder in folders {
            if let Err(e) = self.watch(folder).await {
                warn!("cannot watch {}: {}", folder.path, e);
            }
        }
    }

    pub fn unwatch_all(&self) {
        let mut active = self.active.lock().unwrap();
        for (_, handle) in active.drain() {
            handle.task.abort();
        }
        info!("all folder watchers stopped");
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

impl Drop for FolderWatchers {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            for (_, handle) in active.drain() {
                handle.task.abort();
            }
        }
    }
}

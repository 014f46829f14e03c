//! Ingestion orchestration
//!
//! The single entry point turning path batches (explicit selection,
//! scan results, watch events) into catalog entries: deduplicate,
//! persist the new entries as one append, then dispatch each to the
//! thumbnail pipeline without blocking the caller. State transitions
//! and their notifications all flow through here.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use flow_store::{ProcessingStatus, StoreError, VideoEntry};

use crate::context::CatalogContext;
use crate::dedup;
use crate::error::CatalogError;
use crate::pipeline::ThumbnailPipeline;

/// Orchestrates admission, persistence, and pipeline dispatch.
#[derive(Clone)]
pub struct IngestionCoordinator {
    ctx: Arc<CatalogContext>,
    pipeline: Arc<ThumbnailPipeline>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl IngestionCoordinator {
    pub fn new(ctx: Arc<CatalogContext>) -> Self {
        let pipeline = Arc::new(ThumbnailPipeline::new(ctx.clone()));
        Self {
            ctx,
            pipeline,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn context(&self) -> &Arc<CatalogContext> {
        &self.ctx
    }

    /// Admit `paths`, persist the genuinely new entries, and dispatch
    /// each to the pipeline. Returns the new entries immediately;
    /// processing continues in spawned tasks.
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<Vec<VideoEntry>, CatalogError> {
        let existing = self.ctx.store.videos()?;
        let admitted = dedup::admit(paths, &existing);
        if admitted.is_empty() {
            debug!("no new entries among {} candidate(s)", paths.len());
            return Ok(Vec::new());
        }

        self.ctx.store.append_videos(&admitted)?;
        info!("ingested {} new entr(ies)", admitted.len());
        // observers can render placeholders before any thumbnail exists
        self.ctx.events.catalog_changed();

        for entry in &admitted {
            let this = self.clone();
            let entry = entry.clone();
            let handle = tokio::spawn(async move {
                this.run_entry(entry).await;
            });
            self.tasks.lock().unwrap().push(handle);
        }

        Ok(admitted)
    }

    /// Await every outstanding pipeline task. Lets callers block until
    /// dispatched processing has settled.
    pub async fn wait_idle(&self) {
        loop {
            let drained: Vec<_> = {
                let mut tasks = self.tasks.lock().unwrap();
                tasks.drain(..).collect()
            };
            if drained.is_empty() {
                break;
            }
            for handle in drained {
                let _ = handle.await;
            }
        }
    }

    /// One entry end to end: mark processing, run the pipeline with the
    /// settings in force right now, persist the terminal state, notify.
    async fn run_entry(&self, entry: VideoEntry) {
        let settings = match self.ctx.store.settings() {
            Ok(s) => s.thumbnails,
            Err(e) => {
                error!("cannot read settings for {}: {}", entry.filename, e);
                return;
            }
        };

        if let Err(e) = self.ctx.store.update_video(&entry.id, |v| {
            v.processing_status = ProcessingStatus::Processing;
            v.processing_progress = 0;
        }) {
            error!("cannot mark {} as processing: {}", entry.filename, e);
            return;
        }
        self.ctx.events.catalog_changed();

        match self.pipeline.process(&entry, &settings).await {
            Ok(out) => {
                let update = self.ctx.store.update_video(&entry.id, move |v| {
                    v.metadata = Some(out.metadata);
                    v.thumbnails = out.thumbnails;
                    v.processing_status = ProcessingStatus::Completed;
                    v.processing_progress = 100;
                });
                match update {
                    Ok(_) => self.ctx.events.entry_progress(&entry.id, 100),
                    Err(e) => error!("cannot finalize {}: {}", entry.filename, e),
                }
            }
            Err(e) => {
                warn!("processing failed for {}: {}", entry.filename, e);
                // discard partial output so the terminal state is consistent
                if let Err(e) = self.ctx.store.update_video(&entry.id, |v| {
                    v.processing_status = ProcessingStatus::Error;
                    v.metadata = None;
                    v.thumbnails = Vec::new();
                }) {
                    error!("cannot mark {} as failed: {}", entry.filename, e);
                }
            }
        }

        self.ctx.events.catalog_changed();
    }

    /// Reset one entry and redo every pipeline step. Also serves as the
    /// retry action for entries in `error` state.
    pub async fn regenerate(&self, id: &str) -> Result<VideoEntry, CatalogError> {
        let entry = self
            .ctx
            .store
            .video(id)?
            .ok_or_else(|| CatalogError::EntryNotFound(id.to_string()))?;

        self.delete_thumbnail_files(&entry).await;
        let reset = self.ctx.store.update_video(id, |v| {
            v.processing_status = ProcessingStatus::Processing;
            v.processing_progress = 0;
            v.thumbnails.clear();
            v.metadata = None;
        })?;
        self.ctx.events.catalog_changed();

        self.run_entry(reset).await;

        self.ctx
            .store
            .video(id)?
            .ok_or_else(|| CatalogError::EntryNotFound(id.to_string()))
    }

    /// Rebuild thumbnails for the whole catalog: reset every entry with
    /// a single notification, then process entries strictly one at a
    /// time, persisting and notifying after each.
    pub async fn regenerate_all(&self) -> Result<(), CatalogError> {
        let videos = self.ctx.store.videos()?;
        info!("regenerating thumbnails for {} entr(ies)", videos.len());

        for v in &videos {
            self.delete_thumbnail_files(v).await;
            self.ctx.store.update_video(&v.id, |e| {
                e.processing_status = ProcessingStatus::Processing;
                e.processing_progress = 0;
                e.thumbnails.clear();
                e.metadata = None;
            })?;
        }
        self.ctx.events.catalog_changed();

        for v in videos {
            self.run_entry(v).await;
        }
        Ok(())
    }

    /// Remove an entry and best-effort delete its generated thumbnails.
    pub async fn remove(&self, id: &str) -> Result<(), CatalogError> {
        let entry = self.ctx.store.remove_video(id).map_err(|e| match e {
            StoreError::NotFound(_) => CatalogError::EntryNotFound(id.to_string()),
            other => CatalogError::Store(other),
        })?;

        self.delete_thumbnail_files(&entry).await;
        self.ctx.events.catalog_changed();
        info!("removed {} from the catalog", entry.filename);
        Ok(())
    }

    /// Thumbnail cleanup failure is never catalog-fatal.
    async fn delete_thumbnail_files(&self, entry: &VideoEntry) {
        for thumb in &entry.thumbnails {
            if let Err(e) = tokio::fs::remove_file(thumb).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not remove thumbnail {}: {}", thumb, e);
                }
            }
        }
    }
}

//! Shared dependencies for the ingestion machinery
//!
//! Everything the coordinator, pipeline, and watchers touch is handed
//! over explicitly at construction; there are no process-wide
//! singletons hiding behind module functions.

use std::path::PathBuf;
use std::sync::Arc;

use flow_media::{FfmpegExtractor, FfprobeProber, FrameExtractor, MediaProber};
use flow_store::Store;

use crate::events::EventBus;

/// Dependency bundle passed to [`crate::IngestionCoordinator`] and
/// [`crate::ThumbnailPipeline`] at construction.
pub struct CatalogContext {
    pub store: Arc<Store>,
    pub prober: Arc<dyn MediaProber>,
    pub extractor: Arc<dyn FrameExtractor>,
    pub events: EventBus,
    /// Directory generated thumbnail images are written into.
    pub thumbnail_dir: PathBuf,
}

impl CatalogContext {
    /// Production wiring: ffprobe/ffmpeg collaborators.
    pub fn new(store: Arc<Store>, thumbnail_dir: PathBuf) -> Self {
        Self {
            store,
            prober: Arc::new(FfprobeProber::new()),
            extractor: Arc::new(FfmpegExtractor::new()),
            events: EventBus::new(),
            thumbnail_dir,
        }
    }

    /// Custom media collaborators, used by tests to substitute fakes.
    pub fn with_media(
        store: Arc<Store>,
        thumbnail_dir: PathBuf,
        prober: Arc<dyn MediaProber>,
        extractor: Arc<dyn FrameExtractor>,
    ) -> Self {
        Self {
            store,
            prober,
            extractor,
            events: EventBus::new(),
            thumbnail_dir,
        }
    }
}

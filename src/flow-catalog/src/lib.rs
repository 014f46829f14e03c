//! flow-catalog - Ingestion, deduplication, and thumbnail pipeline
//!
//! The engine that turns a filesystem path into a durable catalog
//! entry with metadata and a thumbnail strip: admission and dedup,
//! recursive folder scanning, continuous watch folders, and the
//! batched thumbnail pipeline with partial-failure tolerance.

pub mod context;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod scanner;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::CatalogContext;
pub use coordinator::IngestionCoordinator;
pub use error::CatalogError;
pub use events::{CatalogEvent, EventBus};
pub use pipeline::{PipelineOutput, ThumbnailPipeline};
pub use scanner::{has_video_extension, scan, VIDEO_EXTENSIONS};
pub use watcher::FolderWatchers;

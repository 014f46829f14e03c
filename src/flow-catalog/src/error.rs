//! Catalog error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("store error: {0}")]
    Store(#[from] flow_store::StoreError),

    #[error("media error: {0}")]
    Media(#[from] flow_media::MediaError),

    #[error("scan failed under {path:?}: {source}")]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("no frames could be extracted")]
    NoFrames,

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

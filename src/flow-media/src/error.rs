//! Media tool error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("probe failed for {path:?}: {stderr}")]
    Probe { path: PathBuf, stderr: String },

    #[error("no usable duration in {0:?}")]
    MissingDuration(PathBuf),

    #[error("frame extraction failed at {timestamp:.2}s: {stderr}")]
    Extract { timestamp: f64, stderr: String },

    #[error("external call exceeded {0:?}")]
    Timeout(std::time::Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unparseable probe output: {0}")]
    Json(#[from] serde_json::Error),
}

//! flow-media - Media probing and frame extraction for Flow
//!
//! Wraps the external ffprobe/ffmpeg tools behind async traits. All
//! CPU-bound work happens in those processes; this crate only spawns
//! them, applies a bounded per-call timeout, and parses their output.

mod error;
mod extract;
mod probe;

pub use error::MediaError;
pub use extract::{FfmpegExtractor, FrameExtractor};
pub use probe::{FfprobeProber, MediaProber, ProbeResult};

use std::process::Command;
use std::time::Duration;

/// A hung probe or extraction would otherwise stall its entry forever.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Check if ffmpeg is available
pub fn check_ffmpeg() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check if ffprobe is available
pub fn check_ffprobe() -> bool {
    Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

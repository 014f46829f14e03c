//! Container/stream metadata probing via ffprobe

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::MediaError;

/// Metadata returned by a successful probe. Duration is mandatory;
/// the other fields fall back to zero/empty when a stream omits them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub bitrate: u64,
}

/// Black-box media prober, kept behind a trait so the pipeline can be
/// driven by scripted fakes in tests.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, MediaError>;
}

/// `ffprobe`-backed prober.
pub struct FfprobeProber {
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new() -> Self {
        Self {
            timeout: super::DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, MediaError> {
        debug!("probing {:?}", path);

        let output = Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(path)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| MediaError::Timeout(self.timeout))?
            .map_err(|source| MediaError::Spawn {
                tool: "ffprobe",
                source,
            })?;

        if !output.status.success() {
            return Err(MediaError::Probe {
                path: path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr)
                    .chars()
                    .take(500)
                    .collect(),
            });
        }

        parse_probe_output(&output.stdout, path)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

fn parse_probe_output(raw: &[u8], path: &Path) -> Result<ProbeResult, MediaError> {
    let parsed: FfprobeOutput = serde_json::from_slice(raw)?;

    let duration = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::MissingDuration(path.to_path_buf()))?;

    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(ProbeResult {
        duration,
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        codec: video_stream
            .and_then(|s| s.codec_name.clone())
            .unwrap_or_default(),
        bitrate: parsed
            .format
            .bit_rate
            .as_deref()
            .and_then(|b| b.parse::<u64>().ok())
            .unwrap_or(0),
    })
}

//! Single-frame extraction via ffmpeg

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::MediaError;

/// Black-box frame extractor. Each call produces one image file at
/// `output`; errors are per-call and never tear down the caller.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract_frame(
        &self,
        path: &Path,
        timestamp: f64,
        width: u32,
        height: u32,
        quality: u32,
        output: &Path,
    ) -> Result<(), MediaError>;
}

/// `ffmpeg`-backed extractor.
pub struct FfmpegExtractor {
    timeout: Duration,
}

impl FfmpegExtractor {
    pub fn new() -> Self {
        Self {
            timeout: super::DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a 1-100 quality percentage onto ffmpeg's qscale, which runs
/// 2 (best) to 31 (worst).
fn quality_to_qscale(quality: u32) -> u32 {
    let quality = quality.clamp(1, 100) as f64;
    (31.0 - (quality / 100.0) * 29.0).round() as u32
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract_frame(
        &self,
        path: &Path,
        timestamp: f64,
        width: u32,
        height: u32,
        quality: u32,
        output: &Path,
    ) -> Result<(), MediaError> {
        debug!("extracting frame at {:.2}s from {:?}", timestamp, path);

        let result = Command::new("ffmpeg")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{timestamp:.3}"))
            .arg("-i")
            .arg(path)
            .arg("-vf")
            .arg(format!("scale={width}:{height}"))
            .arg("-vframes")
            .arg("1")
            .arg("-q:v")
            .arg(quality_to_qscale(quality).to_string())
            .arg(output)
            .output();

        let output_result = tokio::time::timeout(self.timeout, result)
            .await
            .map_err(|_| MediaError::Timeout(self.timeout))?
            .map_err(|source| MediaError::Spawn {
                tool: "ffmpeg",
                source,
            })?;

        if !output_result.status.success() {
            return Err(MediaError::Extract {
                timestamp,
                stderr: String::from_utf8_lossy(&output_result.stderr)
                    .chars()
                    .take(500)
                    .collect(),
            });
        }

        Ok(())
    }
}

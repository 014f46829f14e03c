//! Thumbnail generation pipeline
//!
//! For one catalog entry: probe metadata, plan evenly spaced
//! timestamps, extract frames in bounded concurrent batches, and apply
//! the partial-success policy (at least one usable frame means the run
//! succeeded). Per-frame failures are logged and leave a gap-free
//! result; only a failed probe or zero successful frames fail the run.

use futures::future::join_all;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use flow_store::{ThumbnailSettings, VideoEntry, VideoMetadata};

use crate::context::CatalogContext;
use crate::error::CatalogError;

/// Frame extractions issued concurrently per batch.
pub const FRAME_BATCH_SIZE: usize = 4;

/// Throttle between batches to keep external-process load bursty-free
/// on constrained hosts.
pub const BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Keep the last seek this far from end-of-stream.
const END_GUARD_SECS: f64 = 0.1;

/// Successful pipeline run: metadata plus generated thumbnail paths in
/// timestamp order.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub metadata: VideoMetadata,
    pub thumbnails: Vec<String>,
}

/// Compute `max_count` timestamps evenly spaced across `[0, duration)`,
/// clamped away from end-of-stream so seeks never run past it.
pub fn plan_timestamps(duration: f64, max_count: u32) -> Vec<f64> {
    if max_count == 0 || duration <= 0.0 {
        return Vec::new();
    }
    if max_count == 1 {
        return vec![0.0];
    }

    let end = (duration - END_GUARD_SECS).max(0.0);
    (0..max_count)
        .map(|i| (duration * i as f64 / (max_count - 1) as f64).clamp(0.0, end))
        .collect()
}

/// Turns one entry into metadata plus a thumbnail strip.
pub struct ThumbnailPipeline {
    ctx: Arc<CatalogContext>,
    batch_pause: Duration,
}

impl ThumbnailPipeline {
    pub fn new(ctx: Arc<CatalogContext>) -> Self {
        Self {
            ctx,
            batch_pause: BATCH_PAUSE,
        }
    }

    /// Shorten the inter-batch pause (tests).
    pub fn with_batch_pause(mut self, batch_pause: Duration) -> Self {
        self.batch_pause = batch_pause;
        self
    }

    /// Run probe -> plan -> batched extraction for `entry`.
    ///
    /// Emits per-entry progress on the event bus after every successful
    /// frame; values are monotonically non-decreasing within one run.
    pub async fn process(
        &self,
        entry: &VideoEntry,
        settings: &ThumbnailSettings,
    ) -> Result<PipelineOutput, CatalogError> {
        tokio::fs::create_dir_all(&self.ctx.thumbnail_dir).await?;

        let path = Path::new(&entry.path);
        let probe = self.ctx.prober.probe(path).await?;
        let metadata = VideoMetadata {
            duration: probe.duration,
            width: probe.width,
            height: probe.height,
            codec: probe.codec,
            bitrate: probe.bitrate,
        };

        let timestamps = plan_timestamps(metadata.duration, settings.max_count);
        let total = timestamps.len();
        if total == 0 {
            return Err(CatalogError::NoFrames);
        }
        debug!(
            "processing {} ({:.1}s, {} frames planned)",
            entry.filename, metadata.duration, total
        );

        let processed = AtomicUsize::new(0);
        let mut frames: Vec<(usize, String)> = Vec::new();
        let batch_count = total.div_ceil(FRAME_BATCH_SIZE);

        for (batch_idx, batch) in timestamps.chunks(FRAME_BATCH_SIZE).enumerate() {
            let base = batch_idx * FRAME_BATCH_SIZE;
            let results = join_all(batch.iter().enumerate().map(|(offset, &timestamp)| {
                let index = base + offset;
                let output = self
                    .ctx
                    .thumbnail_dir
                    .join(format!("{}_{}.jpg", entry.id, index));
                let processed = &processed;
                async move {
                    let result = self
                        .ctx
                        .extractor
                        .extract_frame(
                            path,
                            timestamp,
                            settings.width,
                            settings.height,
                            settings.quality,
                            &output,
                        )
                        .await;

                    match result {
                        Ok(()) => {
                            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                            let percent = ((done as f64 / total as f64) * 100.0).round() as u8;
                            self.ctx.events.entry_progress(&entry.id, percent);
                            Some((index, output.to_string_lossy().into_owned()))
                        }
                        Err(e) => {
                            warn!("frame {} of {} failed: {}", index, entry.filename, e);
                            None
                        }
                    }
                }
            }))
            .await;

            frames.extend(results.into_iter().flatten());

            if batch_idx + 1 < batch_count {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        if frames.is_empty() {
            return Err(CatalogError::NoFrames);
        }

        // gap-free, original order preserved
        frames.sort_by_key(|(index, _)| *index);
        Ok(PipelineOutput {
            metadata,
            thumbnails: frames.into_iter().map(|(_, p)| p).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CatalogEvent;
    use crate::test_support::{ScriptedExtractor, StubProber};
    use flow_store::Store;
    use std::path::PathBuf;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn plan_spreads_timestamps_across_the_duration() {
        let plan = plan_timestamps(100.0, 20);
        assert_eq!(plan.len(), 20);
        assert_eq!(plan[0], 0.0);
        for pair in plan.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for t in &plan {
            assert!((0.0..=99.9).contains(t));
        }
        assert_eq!(*plan.last().unwrap(), 99.9);
    }

    #[test]
    fn plan_degenerate_cases() {
        assert_eq!(plan_timestamps(100.0, 1), vec![0.0]);
        assert!(plan_timestamps(100.0, 0).is_empty());
        assert!(plan_timestamps(0.0, 5).is_empty());
    }

    #[test]
    fn plan_never_seeks_past_a_short_stream() {
        for t in plan_timestamps(0.05, 5) {
            assert_eq!(t, 0.0);
        }
    }

    fn pipeline_with(
        prober: StubProber,
        extractor: Arc<ScriptedExtractor>,
        dir: &std::path::Path,
    ) -> (ThumbnailPipeline, Arc<CatalogContext>) {
        let ctx = Arc::new(CatalogContext::with_media(
            Arc::new(Store::in_memory()),
            dir.to_path_buf(),
            Arc::new(prober),
            extractor,
        ));
        (
            ThumbnailPipeline::new(ctx.clone()).with_batch_pause(Duration::from_millis(5)),
            ctx,
        )
    }

    fn entry() -> VideoEntry {
        VideoEntry::new(&PathBuf::from("/v/a.mp4"), 7)
    }

    fn settings(max_count: u32) -> ThumbnailSettings {
        ThumbnailSettings {
            max_count,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn partial_failures_still_complete() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(ScriptedExtractor::failing_calls(&[1, 4, 7]));
        let (pipeline, _ctx) = pipeline_with(StubProber::ok(100.0), extractor.clone(), dir.path());

        let out = pipeline.process(&entry(), &settings(10)).await.unwrap();

        assert_eq!(out.thumbnails.len(), 7);
        assert_eq!(extractor.calls(), 10);
        // gaps removed, order preserved
        for pair in out.thumbnails.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[tokio::test]
    async fn all_frames_failing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(ScriptedExtractor::always_failing());
        let (pipeline, _ctx) = pipeline_with(StubProber::ok(100.0), extractor, dir.path());

        let err = pipeline.process(&entry(), &settings(5)).await.unwrap_err();
        assert!(matches!(err, CatalogError::NoFrames));
    }

    #[tokio::test]
    async fn probe_failure_aborts_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(ScriptedExtractor::succeeding());
        let (pipeline, _ctx) = pipeline_with(StubProber::failing(), extractor.clone(), dir.path());

        let err = pipeline.process(&entry(), &settings(5)).await.unwrap_err();
        assert!(matches!(err, CatalogError::Media(_)));
        assert_eq!(extractor.calls(), 0);
    }

    #[tokio::test]
    async fn batches_cap_concurrent_extractions() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(ScriptedExtractor::succeeding());
        let (pipeline, _ctx) = pipeline_with(StubProber::ok(100.0), extractor.clone(), dir.path());

        let out = pipeline.process(&entry(), &settings(10)).await.unwrap();

        assert_eq!(out.thumbnails.len(), 10);
        assert_eq!(extractor.calls(), 10);
        assert!(extractor.max_in_flight() <= FRAME_BATCH_SIZE);
        assert!(extractor.max_in_flight() >= 2);
        // 10 frames partition into exactly three batches
        assert_eq!(extractor.batch_sizes(), vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_reaches_100() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(ScriptedExtractor::succeeding());
        let (pipeline, ctx) = pipeline_with(StubProber::ok(100.0), extractor, dir.path());

        let mut rx = ctx.events.subscribe();
        let e = entry();
        pipeline.process(&e, &settings(10)).await.unwrap();

        let mut percents = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(CatalogEvent::EntryProgress { entry_id, percent }) => {
                    assert_eq!(entry_id, e.id);
                    percents.push(percent);
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(e) => panic!("unexpected recv error: {e}"),
            }
        }

        assert_eq!(percents.len(), 10);
        for pair in percents.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(*percents.last().unwrap(), 100);
    }
}

//! Scripted media collaborators shared across the crate's tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use flow_media::{FrameExtractor, MediaError, MediaProber, ProbeResult};

/// Prober answering with a fixed duration, or failing outright.
pub struct StubProber {
    duration: Option<f64>,
}

impl StubProber {
    pub fn ok(duration: f64) -> Self {
        Self {
            duration: Some(duration),
        }
    }

    pub fn failing() -> Self {
        Self { duration: None }
    }
}

#[async_trait]
impl MediaProber for StubProber {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, MediaError> {
        match self.duration {
            Some(duration) => Ok(ProbeResult {
                duration,
                width: 1920,
                height: 1080,
                codec: "h264".to_string(),
                bitrate: 4_000_000,
            }),
            None => Err(MediaError::MissingDuration(path.to_path_buf())),
        }
    }
}

/// Extractor that fails a scripted set of calls (by zero-based call
/// order) and records how many extractions ran at once. Calls that
/// start while others are in flight join the current batch; a call
/// starting from idle opens a new one.
pub struct ScriptedExtractor {
    fail_calls: HashSet<usize>,
    fail_all: bool,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl ScriptedExtractor {
    fn new(fail_calls: HashSet<usize>, fail_all: bool) -> Self {
        Self {
            fail_calls,
            fail_all,
            // long enough for batch-mates to overlap
            delay: Duration::from_millis(10),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(HashSet::new(), false)
    }

    pub fn always_failing() -> Self {
        Self::new(HashSet::new(), true)
    }

    pub fn failing_calls(calls: &[usize]) -> Self {
        Self::new(calls.iter().copied().collect(), false)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameExtractor for ScriptedExtractor {
    async fn extract_frame(
        &self,
        _path: &Path,
        timestamp: f64,
        _width: u32,
        _height: u32,
        _quality: u32,
        _output: &Path,
    ) -> Result<(), MediaError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let previously_running = self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.max_in_flight
            .fetch_max(previously_running + 1, Ordering::SeqCst);
        {
            let was_idle = previously_running == 0;
            let mut batches = self.batch_sizes.lock().unwrap();
            if was_idle {
                batches.push(1);
            } else if let Some(current) = batches.last_mut() {
                *current += 1;
            }
        }

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_all || self.fail_calls.contains(&call) {
            return Err(MediaError::Extract {
                timestamp,
                stderr: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

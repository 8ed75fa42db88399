//! Test doubles for the pipeline.
//!
//! [`FakeTranscoder`] stands in for ffmpeg: durations are configured per
//! source, conversions can be delayed, failed or hung, and concurrency is
//! recorded so tests can check wave bounds.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use lc_av::Transcoder;
use lc_core::{Error, Result, SegmentJob};

#[derive(Default)]
struct FakeState {
    sources: HashMap<PathBuf, Duration>,
    outputs: HashMap<PathBuf, Duration>,
    failing_sources: HashSet<PathBuf>,
    failing_segments: HashSet<(PathBuf, usize)>,
    hanging_sources: HashSet<PathBuf>,
    converted: Vec<(PathBuf, usize)>,
}

/// In-memory [`Transcoder`].
///
/// Output duration of a job is `min(range.length, source - range.start)`,
/// matching how a real encoder stops at end-of-stream.
#[derive(Default)]
pub struct FakeTranscoder {
    state: Mutex<FakeState>,
    delay: Duration,
    write_files: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    probes: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every conversion take `delay` (tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Write a small payload to each job's output path.
    pub fn writing_files(mut self) -> Self {
        self.write_files = true;
        self
    }

    pub fn add_source(&self, path: impl Into<PathBuf>, duration: Duration) {
        self.state.lock().sources.insert(path.into(), duration);
    }

    pub fn fail_source(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing_sources.insert(path.into());
    }

    pub fn fail_segment(&self, path: impl Into<PathBuf>, index: usize) {
        self.state.lock().failing_segments.insert((path.into(), index));
    }

    /// Conversions of this source never complete.
    pub fn hang_source(&self, path: impl Into<PathBuf>) {
        self.state.lock().hanging_sources.insert(path.into());
    }

    /// Conversions that ran to completion, in completion order.
    pub fn converted(&self) -> Vec<(PathBuf, usize)> {
        self.state.lock().converted.clone()
    }

    /// Highest number of conversions observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the conversion is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe_duration(&self, path: &Path) -> Result<Duration> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        state
            .sources
            .get(path)
            .or_else(|| state.outputs.get(path))
            .copied()
            .ok_or_else(|| Error::Probe(format!("{}: unknown file", path.display())))
    }

    async fn convert(&self, job: &SegmentJob) -> Result<PathBuf> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let (hang, fail, source_len) = {
            let state = self.state.lock();
            (
                state.hanging_sources.contains(&job.source),
                state.failing_sources.contains(&job.source)
                    || state
                        .failing_segments
                        .contains(&(job.source.clone(), job.index)),
                state.sources.get(&job.source).copied(),
            )
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(Error::tool("fake", format!("cannot convert {}", job.range)));
        }

        let source_len = source_len.ok_or_else(|| {
            Error::tool("fake", format!("{} is not a known source", job.source.display()))
        })?;
        let produced = source_len.saturating_sub(job.range.start).min(job.range.length);

        if self.write_files {
            if let Some(parent) = job.output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(
                &job.output,
                format!(
                    "segment {} of {} at {}",
                    job.index,
                    job.source.display(),
                    job.output.display()
                ),
            )?;
        }

        let mut state = self.state.lock();
        state.outputs.insert(job.output.clone(), produced);
        state.converted.push((job.source.clone(), job.index));
        Ok(job.output.clone())
    }
}

/// Create a content library under `root`.
///
/// Each entry is a group directory and a file path relative to it. Returns
/// the created file paths in order.
pub fn create_library(root: &Path, layout: &[(&str, &str)]) -> Vec<PathBuf> {
    layout
        .iter()
        .map(|(group, file)| {
            let path = root.join(group).join(file);
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    panic!("cannot create {}: {e}", parent.display());
                }
            }
            if let Err(e) = std::fs::write(&path, b"media") {
                panic!("cannot write {}: {e}", path.display());
            }
            path
        })
        .collect()
}

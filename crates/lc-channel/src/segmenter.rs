//! Cutting a source into fixed-duration segments.
//!
//! [`segment_offsets`] plans the cut points. [`Segmenter::fragment`] probes
//! the source and turns the plan into a [`Fragmentation`], which converts the
//! jobs in waves of at most `concurrency` conversions and hands each wave back
//! as soon as it completes.
//!
//! A single failed or timed-out conversion fails the wave; the remaining jobs
//! are discarded and in-flight siblings are dropped (which kills their
//! encoder processes).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;

use lc_av::Transcoder;
use lc_core::config::SegmenterConfig;
use lc_core::{Error, GenerationId, Result, Segment, SegmentJob, SourceFile, TimeRange};

/// Start offsets for cutting a source of length `duration`.
///
/// Returns `i * target` for every `i` with `i * target + min < duration`.
/// Indices are contiguous from zero. A zero `target` yields no offsets.
pub fn segment_offsets(duration: Duration, target: Duration, min: Duration) -> Vec<Duration> {
    if target.is_zero() {
        return Vec::new();
    }
    (0u32..)
        .map(|i| target * i)
        .take_while(|start| *start + min < duration)
        .collect()
}

/// Plans and converts segments for one source at a time.
#[derive(Clone)]
pub struct Segmenter {
    transcoder: Arc<dyn Transcoder>,
    output_dir: PathBuf,
    format: String,
    target: Duration,
    min: Duration,
    concurrency: usize,
    convert_timeout: Duration,
    probe_timeout: Duration,
}

impl Segmenter {
    pub fn new(transcoder: Arc<dyn Transcoder>, config: &SegmenterConfig) -> Self {
        Self {
            transcoder,
            output_dir: config.output_dir.clone(),
            format: config.format.clone(),
            target: config.target_duration(),
            min: config.min_duration(),
            concurrency: config.concurrency(),
            convert_timeout: config.convert_timeout(),
            probe_timeout: config.probe_timeout(),
        }
    }

    /// Resolve the source duration and plan its segment jobs.
    ///
    /// Every fragmentation writes into its own generation directory under the
    /// output dir, so a source picked twice never overwrites segments that
    /// clients may still be reading.
    pub async fn fragment(&self, source: SourceFile) -> Result<Fragmentation> {
        let duration = match source.duration {
            Some(d) => d,
            None => self.probe(&source).await?,
        };
        let source = source.with_duration(duration);

        let generation = GenerationId::new();
        let dir = self.output_dir.join(generation.to_string());
        let jobs: VecDeque<SegmentJob> = segment_offsets(duration, self.target, self.min)
            .into_iter()
            .enumerate()
            .map(|(index, start)| SegmentJob {
                source: source.path.clone(),
                index,
                range: TimeRange::new(start, self.target),
                output: dir.join(format!("{index}.{}", self.format)),
            })
            .collect();

        tracing::debug!(
            source = %source.label(),
            duration_secs = duration.as_secs_f64(),
            segments = jobs.len(),
            %generation,
            "Planned segments"
        );

        Ok(Fragmentation {
            source,
            jobs,
            transcoder: Arc::clone(&self.transcoder),
            concurrency: self.concurrency.max(1),
            convert_timeout: self.convert_timeout,
        })
    }

    async fn probe(&self, source: &SourceFile) -> Result<Duration> {
        match tokio::time::timeout(
            self.probe_timeout,
            self.transcoder.probe_duration(&source.path),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Probe(format!(
                "{}: timed out after {:?}",
                source.path.display(),
                self.probe_timeout
            ))),
        }
    }
}

/// The pending conversions of one source.
pub struct Fragmentation {
    source: SourceFile,
    jobs: VecDeque<SegmentJob>,
    transcoder: Arc<dyn Transcoder>,
    concurrency: usize,
    convert_timeout: Duration,
}

impl Fragmentation {
    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Jobs not yet started.
    pub fn remaining(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Convert the next wave of jobs.
    ///
    /// Returns `Ok(None)` once every job has been converted. Segments come
    /// back in index order. On error the remaining jobs are dropped, so the
    /// fragmentation is exhausted afterwards.
    pub async fn next_wave(&mut self) -> Result<Option<Vec<Segment>>> {
        if self.jobs.is_empty() {
            return Ok(None);
        }

        let n = self.concurrency.min(self.jobs.len());
        let wave: Vec<SegmentJob> = self.jobs.drain(..n).collect();

        let transcoder = self.transcoder.as_ref();
        let timeout = self.convert_timeout;
        let result = try_join_all(wave.iter().map(|job| convert_one(transcoder, job, timeout))).await;

        match result {
            Ok(segments) => Ok(Some(segments)),
            Err(e) => {
                self.jobs.clear();
                Err(e)
            }
        }
    }
}

/// Convert one job and measure what was actually produced.
async fn convert_one(
    transcoder: &dyn Transcoder,
    job: &SegmentJob,
    timeout: Duration,
) -> Result<Segment> {
    let work = async {
        let path = transcoder.convert(job).await?;
        let duration = transcoder.probe_duration(&path).await?;
        Ok::<_, Error>((path, duration))
    };

    let (path, duration) = match tokio::time::timeout(timeout, work).await {
        Err(_) => return Err(Error::ConversionTimeout { range: job.range }),
        Ok(Err(e)) if e.is_cancelled() => return Err(e),
        Ok(Err(e)) => return Err(Error::conversion(job.range, e.to_string())),
        Ok(Ok(produced)) => produced,
    };

    if duration.is_zero() {
        return Err(Error::conversion(job.range, "segment has zero duration"));
    }

    tracing::debug!(
        index = job.index,
        range = %job.range,
        duration_secs = duration.as_secs_f64(),
        "Converted segment"
    );

    Ok(Segment {
        source: job.source.clone(),
        index: job.index,
        path,
        duration,
    })
}

//! Media data model shared by the broadcast pipeline.
//!
//! A [`SourceFile`] is cut into [`SegmentJob`]s, each job is turned into one
//! [`Segment`] by the transcoder, and segments are shared read-only (behind
//! `Arc`) between the prefetch cache, every client queue, and the "latest"
//! pointer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// TimeRange
// ---------------------------------------------------------------------------

/// A slice of a source file, expressed as a start offset and a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Duration,
    pub length: Duration,
}

impl TimeRange {
    pub fn new(start: Duration, length: Duration) -> Self {
        Self { start, length }
    }

    /// End offset of the range (may lie past the end of the source).
    pub fn end(&self) -> Duration {
        self.start + self.length
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}s+{:.3}s",
            self.start.as_secs_f64(),
            self.length.as_secs_f64()
        )
    }
}

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

/// A file picked from the content library.
///
/// The duration is resolved lazily by the segmenter and never changes once
/// set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub duration: Option<Duration>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration: None,
        }
    }

    /// Return a copy carrying the resolved duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Short "parent/name" label used in logs and events.
    pub fn label(&self) -> String {
        label_for(&self.path)
    }
}

// ---------------------------------------------------------------------------
// SegmentJob
// ---------------------------------------------------------------------------

/// One pending conversion: cut `range` out of `source` into `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentJob {
    pub source: PathBuf,
    pub index: usize,
    pub range: TimeRange,
    pub output: PathBuf,
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// A converted slice of media, ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Source file this segment was cut from.
    pub source: PathBuf,
    /// Position of the segment within its source.
    pub index: usize,
    /// Converted file on disk.
    pub path: PathBuf,
    /// Real playback duration as reported by the probe.
    pub duration: Duration,
}

impl Segment {
    /// MIME type advertised to clients, derived from the file extension.
    pub fn content_type(&self) -> &'static str {
        match self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("webm") => "video/webm",
            Some("mp4") | Some("m4s") => "video/mp4",
            Some("ts") => "video/mp2t",
            _ => "application/octet-stream",
        }
    }

    pub fn source_label(&self) -> String {
        label_for(&self.source)
    }
}

fn label_for(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match path.parent().and_then(|p| p.file_name()) {
        Some(dir) => format!("{}/{}", dir.to_string_lossy(), name),
        None => name,
    }
}

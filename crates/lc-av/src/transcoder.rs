//! The transcoder seam driven by the segmenter.
//!
//! [`Transcoder`] is the boundary between the broadcast pipeline and the
//! external encoding tool: a metadata query (how long is this file?) and a
//! cut-and-encode call (produce this slice as a standalone segment file).
//! [`FfmpegTranscoder`] is the production implementation; tests substitute
//! their own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use lc_core::config::SegmenterConfig;
use lc_core::SegmentJob;

use crate::command::ToolCommand;
use crate::probe;
use crate::tools::ToolRegistry;

/// External transcoder contract.
///
/// Both calls suspend until the tool responds. Implementations must stop any
/// external work when the returned future is dropped, since callers impose
/// their own timeouts and abandon in-flight calls on shutdown.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Playback duration of a media file.
    async fn probe_duration(&self, path: &Path) -> lc_core::Result<Duration>;

    /// Encode `job.range` of `job.source` into `job.output` and return the
    /// path of the produced file.
    async fn convert(&self, job: &SegmentJob) -> lc_core::Result<PathBuf>;
}

/// Codec settings applied to every segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    pub format: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub threads: usize,
    pub extra_args: Vec<String>,
}

impl From<&SegmenterConfig> for EncodeOptions {
    fn from(cfg: &SegmenterConfig) -> Self {
        Self {
            format: cfg.format.clone(),
            video_codec: cfg.video_codec.clone(),
            audio_codec: cfg.audio_codec.clone(),
            threads: cfg.encoder_threads(),
            extra_args: cfg.extra_args.clone(),
        }
    }
}

/// ffmpeg/ffprobe backed [`Transcoder`].
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    options: EncodeOptions,
    probe_timeout: Duration,
    convert_timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf, config: &SegmenterConfig) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            options: EncodeOptions::from(config),
            probe_timeout: config.probe_timeout(),
            convert_timeout: config.convert_timeout(),
        }
    }

    /// Build a transcoder from discovered tools, failing if either is missing.
    pub fn from_registry(
        tools: &ToolRegistry,
        config: &SegmenterConfig,
    ) -> lc_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?.path.clone();
        let ffprobe = tools.require("ffprobe")?.path.clone();
        Ok(Self::new(ffmpeg, ffprobe, config))
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn probe_duration(&self, path: &Path) -> lc_core::Result<Duration> {
        probe::probe_duration(&self.ffprobe, path, self.probe_timeout).await
    }

    async fn convert(&self, job: &SegmentJob) -> lc_core::Result<PathBuf> {
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        // The segmenter enforces the real budget; this is a backstop.
        cmd.timeout(self.convert_timeout + Duration::from_secs(5));
        cmd.args(convert_args(job, &self.options));

        tracing::debug!(
            source = %job.source.display(),
            index = job.index,
            range = %job.range,
            "Converting segment"
        );
        cmd.execute().await?;

        let produced = tokio::fs::metadata(&job.output).await.map(|m| m.len());
        match produced {
            Ok(len) if len > 0 => Ok(job.output.clone()),
            Ok(_) => Err(lc_core::Error::tool("ffmpeg", "produced an empty segment")),
            Err(e) => Err(lc_core::Error::tool(
                "ffmpeg",
                format!("segment {} missing: {e}", job.output.display()),
            )),
        }
    }
}

/// Build the ffmpeg argument list for one segment job.
///
/// Input seeking (`-ss` before `-i`) keeps each cut independent of the
/// previous one; `-t` may run past the end of the source, in which case
/// ffmpeg simply stops at end-of-stream.
pub fn convert_args(job: &SegmentJob, options: &EncodeOptions) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-ss".into(),
        format!("{:.3}", job.range.start.as_secs_f64()),
        "-i".into(),
        job.source.to_string_lossy().to_string(),
        "-t".into(),
        format!("{:.3}", job.range.length.as_secs_f64()),
        "-c:v".into(),
        options.video_codec.clone(),
        "-c:a".into(),
        options.audio_codec.clone(),
        "-threads".into(),
        options.threads.to_string(),
    ];
    args.extend(options.extra_args.iter().cloned());
    args.extend([
        "-f".into(),
        options.format.clone(),
        job.output.to_string_lossy().to_string(),
    ]);
    args
}

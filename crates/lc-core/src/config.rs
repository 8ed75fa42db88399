//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, content library, segmenter, prefetch cache and
//! external tools. Every section defaults sensibly so a completely empty `{}`
//! file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Upper bound on concurrent conversions when none is configured.
const MAX_DEFAULT_CONCURRENCY: usize = 8;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub segmenter: SegmenterConfig,
    pub prefetch: PrefetchConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Read and parse a config file, failing on any error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.library.allowed_tags.is_empty() {
            warnings.push(
                "library.allowed_tags is empty; no directory will ever be selected".into(),
            );
        }

        if !self.library.root.exists() {
            warnings.push(format!(
                "library.root {} does not exist",
                self.library.root.display()
            ));
        }

        let seg = &self.segmenter;
        if seg.target_duration_secs <= 0.0 {
            warnings.push("segmenter.target_duration_secs must be positive".into());
        }
        if seg.min_duration_secs < 0.0 {
            warnings.push("segmenter.min_duration_secs must not be negative".into());
        }
        if seg.min_duration_secs >= seg.target_duration_secs {
            warnings.push(
                "segmenter.min_duration_secs is not below target_duration_secs".into(),
            );
        }
        if seg.max_concurrency == Some(0) {
            warnings.push("segmenter.max_concurrency is 0; the default will be used".into());
        }
        if seg.convert_timeout_secs == 0 {
            warnings.push("segmenter.convert_timeout_secs is 0; every conversion will time out".into());
        }

        if self.prefetch.lookahead == 0 {
            warnings.push("prefetch.lookahead is 0; every tick will wait on the transcoder".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            static_dir: None,
        }
    }
}

/// Content library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory whose first-level subdirectories are candidate groups.
    pub root: PathBuf,
    /// A group is eligible when its directory name ends with one of these.
    pub allowed_tags: Vec<String>,
    /// Pause between failed selection attempts and after an abandoned source.
    pub retry_delay_ms: u64,
}

impl LibraryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./content"),
            allowed_tags: vec!["live".into()],
            retry_delay_ms: 1000,
        }
    }
}

/// Segment production settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub target_duration_secs: f64,
    pub min_duration_secs: f64,
    /// Conversions launched per wave (None = min(8, cores)).
    pub max_concurrency: Option<usize>,
    pub convert_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub output_dir: PathBuf,
    /// Container extension passed to ffmpeg `-f`.
    pub format: String,
    pub video_codec: String,
    pub audio_codec: String,
    /// Encoder threads per conversion (None = number of cores).
    pub threads: Option<usize>,
    pub extra_args: Vec<String>,
}

impl SegmenterConfig {
    pub fn target_duration(&self) -> Duration {
        Duration::from_secs_f64(self.target_duration_secs.max(0.0))
    }

    pub fn min_duration(&self) -> Duration {
        Duration::from_secs_f64(self.min_duration_secs.max(0.0))
    }

    pub fn convert_timeout(&self) -> Duration {
        Duration::from_secs(self.convert_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Effective wave size; always at least one.
    pub fn concurrency(&self) -> usize {
        match self.max_concurrency {
            Some(n) if n > 0 => n,
            _ => num_cpus::get().clamp(1, MAX_DEFAULT_CONCURRENCY),
        }
    }

    pub fn encoder_threads(&self) -> usize {
        self.threads.filter(|t| *t > 0).unwrap_or_else(num_cpus::get)
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            target_duration_secs: 10.0,
            min_duration_secs: 1.0,
            max_concurrency: None,
            convert_timeout_secs: 120,
            probe_timeout_secs: 30,
            output_dir: PathBuf::from("./data/chunks"),
            format: "webm".into(),
            video_codec: "libvpx-vp9".into(),
            audio_codec: "libopus".into(),
            threads: None,
            extra_args: vec![
                "-cpu-used".into(),
                "-5".into(),
                "-deadline".into(),
                "realtime".into(),
            ],
        }
    }
}

/// Lookahead cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Number of segments kept ready ahead of broadcast time.
    pub lookahead: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self { lookahead: 3 }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

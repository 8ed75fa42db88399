//! # lc-av
//!
//! External tool management and transcoding for the loopcast pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support that kills the child process when the call is abandoned.
//! - **Probing** ([`probe`]) -- read a media file's duration through ffprobe.
//! - **Transcoding** ([`Transcoder`], [`FfmpegTranscoder`]) -- the seam the
//!   segmenter drives: one metadata query and one cut-and-encode call per
//!   segment.

pub mod command;
pub mod probe;
pub mod tools;
pub mod transcoder;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::probe_duration;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use transcoder::{EncodeOptions, FfmpegTranscoder, Transcoder};

//! Duration probing through `ffprobe`.
//!
//! Shells out to `ffprobe -v error -show_entries format=duration -of json`
//! and reads the container duration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::command::ToolCommand;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Read the playback duration of `path` with the given ffprobe binary.
pub async fn probe_duration(
    ffprobe: &Path,
    path: &Path,
    timeout: Duration,
) -> lc_core::Result<Duration> {
    let mut cmd = ToolCommand::new(ffprobe.to_path_buf());
    cmd.timeout(timeout);
    cmd.args([
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "json",
    ]);
    cmd.arg(path.to_string_lossy().to_string());

    let output = cmd.execute().await?;
    parse_duration(&output.stdout)
        .map_err(|e| lc_core::Error::Probe(format!("{}: {e}", path.display())))
}

/// Extract the format duration from ffprobe's JSON output.
fn parse_duration(stdout: &str) -> Result<Duration, String> {
    let parsed: FfprobeOutput =
        serde_json::from_str(stdout).map_err(|e| format!("ffprobe JSON parse error: {e}"))?;

    let raw = parsed
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| "no duration reported".to_string())?;

    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration {raw:?}"))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("invalid duration {raw:?}"));
    }

    Ok(Duration::from_secs_f64(secs))
}

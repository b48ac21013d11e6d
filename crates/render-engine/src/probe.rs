//! Media duration probing via `ffprobe`.

use std::path::Path;
use std::process::{Command, Stdio};

use clipmix_common::error::{ClipmixError, ClipmixResult};

/// Anything that can report the duration of a media file in seconds.
pub trait DurationProbe: Send {
    fn probe_duration(&self, path: &Path) -> ClipmixResult<f64>;

    /// Sum of the durations of all `paths`. Fails on the first probe error.
    fn total_duration(&self, paths: &[&Path]) -> ClipmixResult<f64> {
        let mut total = 0.0;
        for path in paths {
            total += self.probe_duration(path)?;
        }
        Ok(total)
    }
}

/// Probes durations by running `ffprobe` once per file.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl DurationProbe for FfprobeProbe {
    fn probe_duration(&self, path: &Path) -> ClipmixResult<f64> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClipmixError::ToolMissing {
                        tool: self.binary.clone(),
                    }
                } else {
                    ClipmixError::probe(path, format!("failed to run {}: {e}", self.binary))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClipmixError::probe(
                path,
                format!("{} exited with {}: {}", self.binary, output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration = parse_duration_output(&stdout).ok_or_else(|| {
            ClipmixError::probe(path, format!("unparsable duration output {:?}", stdout.trim()))
        })?;

        tracing::debug!(path = %path.display(), duration_secs = duration, "Probed duration");
        Ok(duration)
    }
}

/// Parse the single-value duration printed by `ffprobe`.
///
/// Only strictly positive, finite values are accepted.
pub fn parse_duration_output(raw: &str) -> Option<f64> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let secs = line.parse::<f64>().ok()?;
    if secs.is_finite() && secs > 0.0 {
        Some(secs)
    } else {
        None
    }
}

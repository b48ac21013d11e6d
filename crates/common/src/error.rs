//! Error types shared across ClipMix crates.

use std::path::PathBuf;

/// Top-level error type for ClipMix operations.
#[derive(Debug, thiserror::Error)]
pub enum ClipmixError {
    #[error("{tool} failed for {label} (exit code {code:?}): {stderr}")]
    ExternalToolFailure {
        tool: String,
        label: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Could not probe duration of {path}: {message}")]
    ProbeFailure { path: PathBuf, message: String },

    #[error("Transcode of {label} exceeded {secs}s and was killed")]
    TranscodeTimeout { label: String, secs: u64 },

    #[error("Required tool not found: {tool}")]
    ToolMissing { tool: String },

    #[error("Catalog error: {message}")]
    Catalog { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClipmixError.
pub type ClipmixResult<T> = Result<T, ClipmixError>;

impl ClipmixError {
    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ProbeFailure {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error only invalidates a single combination and the
    /// batch should move on to the next one.
    pub fn is_per_combination(&self) -> bool {
        matches!(
            self,
            Self::ExternalToolFailure { .. }
                | Self::ProbeFailure { .. }
                | Self::TranscodeTimeout { .. }
                | Self::Render { .. }
                | Self::FileNotFound { .. }
                | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_tool_failure_message_includes_exit_code() {
        let err = ClipmixError::ExternalToolFailure {
            tool: "ffmpeg".to_string(),
            label: "A_lead-skip_C".to_string(),
            code: Some(1),
            stderr: "Invalid data found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("A_lead-skip_C"));
        assert!(msg.contains("Some(1)"));
        assert!(err.is_per_combination());
    }

    #[test]
    fn test_config_errors_are_not_per_combination() {
        assert!(!ClipmixError::config("bad").is_per_combination());
        assert!(!ClipmixError::ToolMissing {
            tool: "ffmpeg".into()
        }
        .is_per_combination());
    }
}

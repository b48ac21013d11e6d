//! Clip references and the categories they are filed under.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogError;

/// File extensions accepted for category clips.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// File extensions accepted for the background track.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3"];

/// The three clip categories, in the order they are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Opening clip.
    Lead,
    /// Clip placed between the lead and the body.
    Middle,
    /// Main segment.
    Body,
}

impl Category {
    /// All categories in concatenation order.
    pub const ALL: [Category; 3] = [Category::Lead, Category::Middle, Category::Body];

    /// Token used in output labels when this category has no clip.
    ///
    /// Lead and middle share `lead-skip`; downstream consumers parse
    /// filenames with this exact scheme.
    pub fn skip_token(self) -> &'static str {
        match self {
            Category::Lead | Category::Middle => "lead-skip",
            Category::Body => "body-skip",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Lead => "lead",
            Category::Middle => "middle",
            Category::Body => "body",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single input clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clip {
    /// Absolute location of the media file.
    pub path: PathBuf,

    /// Display name, used verbatim in output filenames.
    pub label: String,
}

impl Clip {
    /// Create a clip with an explicit label.
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }

    /// Build a clip from a file path, deriving the label from its sanitized
    /// file stem. Relative paths are resolved against the working directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = absolutize(path.as_ref())?;
        let label = derive_label(&path).ok_or_else(|| CatalogError::InvalidClip {
            path: path.clone(),
            reason: "file name has no usable characters".to_string(),
        })?;
        Ok(Self { path, label })
    }

    /// Check a clip that did not come from [`Clip::from_path`]: the path
    /// must be absolute and the label must survive [`sanitize_file_name`]
    /// unchanged, so it can never leave the export directory.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if !self.path.is_absolute() {
            return Err(CatalogError::InvalidClip {
                path: self.path.clone(),
                reason: "path is not absolute".to_string(),
            });
        }
        if self.label.is_empty() || sanitize_file_name(&self.label) != self.label {
            return Err(CatalogError::InvalidClip {
                path: self.path.clone(),
                reason: format!("label {:?} is not a safe file name", self.label),
            });
        }
        Ok(())
    }
}

/// Sanitize an uploaded file name so it is safe to embed in another file
/// name: whitespace runs become `_`, anything outside `[A-Za-z0-9._-]` is
/// dropped, and leading/trailing `.`/`_` are trimmed.
pub fn sanitize_file_name(raw: &str) -> String {
    let joined = raw
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Label for a clip file: the sanitized file name without its extension.
pub fn derive_label(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_string_lossy();
    let sanitized = sanitize_file_name(&file_name);
    let stem = match sanitized.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
        _ => sanitized,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Whether `path` carries one of the `allowed` extensions (case-insensitive).
pub fn has_allowed_extension(path: &Path, allowed: &[&str]) -> bool {
    extension_of(path)
        .map(|ext| allowed.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub(crate) fn absolutize(path: &Path) -> Result<PathBuf, CatalogError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| CatalogError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(cwd.join(path))
}

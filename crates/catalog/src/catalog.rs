//! The clip catalog: everything a render batch draws from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clip::{
    absolutize, has_allowed_extension, Category, Clip, AUDIO_EXTENSIONS, VIDEO_EXTENSIONS,
};

/// Ordered clips for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySlot {
    clips: Vec<Clip>,
}

impl CategorySlot {
    pub fn new(clips: Vec<Clip>) -> Self {
        Self { clips }
    }

    pub fn push(&mut self, clip: Clip) {
        self.clips.push(clip);
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Entries used for enumeration. An empty slot yields a single `None`
    /// so it multiplies the combination count by one, not zero.
    pub fn entries(&self) -> Vec<Option<&Clip>> {
        if self.clips.is_empty() {
            vec![None]
        } else {
            self.clips.iter().map(Some).collect()
        }
    }
}

/// Background audio mixed under every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundTrack {
    /// Absolute location of the audio file.
    pub path: PathBuf,

    /// Linear gain applied to the track.
    pub volume_factor: f64,

    /// Tile the track when it is shorter than the assembled clips.
    #[serde(rename = "loop", default)]
    pub loop_track: bool,
}

impl BackgroundTrack {
    /// Create a background track from a gain given in decibels.
    pub fn from_db(path: impl Into<PathBuf>, volume_db: f64, loop_track: bool) -> Self {
        Self {
            path: path.into(),
            volume_factor: db_to_gain(volume_db),
            loop_track,
        }
    }
}

/// Convert a decibel value to a linear gain factor: `10^(dB/20)`.
pub fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// All clips available to one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub lead: CategorySlot,

    #[serde(default)]
    pub middle: CategorySlot,

    #[serde(default)]
    pub body: CategorySlot,

    #[serde(default)]
    pub background: Option<BackgroundTrack>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn slot(&self, category: Category) -> &CategorySlot {
        match category {
            Category::Lead => &self.lead,
            Category::Middle => &self.middle,
            Category::Body => &self.body,
        }
    }

    pub fn slot_mut(&mut self, category: Category) -> &mut CategorySlot {
        match category {
            Category::Lead => &mut self.lead,
            Category::Middle => &mut self.middle,
            Category::Body => &mut self.body,
        }
    }

    /// True when no category holds a clip; such a catalog renders nothing.
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.slot(*c).is_empty())
    }

    /// Load a catalog manifest (JSON).
    ///
    /// Relative paths in the manifest are resolved against the manifest's
    /// directory. The result is validated like a hand-built catalog.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| CatalogError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut catalog: Self =
            serde_json::from_str(&json).map_err(|e| CatalogError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        let manifest = absolutize(path)?;
        let base = manifest.parent().unwrap_or(Path::new("/"));
        catalog.resolve_relative_paths(base);
        catalog.validate()?;
        Ok(catalog)
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        for category in Category::ALL {
            for clip in &mut self.slot_mut(category).clips {
                if clip.path.is_relative() {
                    clip.path = base.join(&clip.path);
                }
            }
        }
        if let Some(bg) = &mut self.background {
            if bg.path.is_relative() {
                bg.path = base.join(&bg.path);
            }
        }
    }

    /// Check every clip (see [`Clip::validate`]) and the background track.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for category in Category::ALL {
            for clip in self.slot(category).clips() {
                clip.validate()?;
            }
        }
        if let Some(bg) = &self.background {
            if !bg.path.is_absolute() {
                return Err(CatalogError::InvalidClip {
                    path: bg.path.clone(),
                    reason: "background path is not absolute".to_string(),
                });
            }
            if !bg.volume_factor.is_finite() || bg.volume_factor < 0.0 {
                return Err(CatalogError::ValidationError {
                    message: format!("background volume {} is not usable", bg.volume_factor),
                });
            }
        }
        Ok(())
    }

    /// Write this catalog as a JSON manifest.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| CatalogError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| CatalogError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Paths referenced by the catalog that do not exist on disk.
    pub fn missing_sources(&self) -> Vec<PathBuf> {
        let mut missing: Vec<PathBuf> = Category::ALL
            .iter()
            .flat_map(|c| self.slot(*c).clips())
            .map(|clip| clip.path.clone())
            .filter(|path| !path.exists())
            .collect();
        if let Some(bg) = &self.background {
            if !bg.path.exists() {
                missing.push(bg.path.clone());
            }
        }
        missing
    }
}

/// Assembles a [`Catalog`] from raw file paths.
///
/// Files with an unsupported extension are skipped with a warning rather
/// than failing the whole catalog.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: Catalog,
    skipped: Vec<PathBuf>,
}

impl CatalogBuilder {
    /// Add a clip file to a category.
    pub fn clip(mut self, category: Category, path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !has_allowed_extension(path, VIDEO_EXTENSIONS) {
            tracing::warn!(
                category = %category,
                path = %path.display(),
                "Skipping clip with unsupported extension"
            );
            self.skipped.push(path.to_path_buf());
            return Ok(self);
        }
        let clip = Clip::from_path(path)?;
        self.catalog.slot_mut(category).push(clip);
        Ok(self)
    }

    /// Add several clip files to a category, preserving their order.
    pub fn clips<I, P>(mut self, category: Category, paths: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            self = self.clip(category, path)?;
        }
        Ok(self)
    }

    /// Set the background track. Unsupported extensions are skipped.
    pub fn background(
        mut self,
        path: impl AsRef<Path>,
        volume_db: f64,
        loop_track: bool,
    ) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !has_allowed_extension(path, AUDIO_EXTENSIONS) {
            tracing::warn!(
                path = %path.display(),
                "Skipping background track with unsupported extension"
            );
            self.skipped.push(path.to_path_buf());
            return Ok(self);
        }
        if !volume_db.is_finite() {
            return Err(CatalogError::ValidationError {
                message: format!("background volume must be finite, got {volume_db}"),
            });
        }
        self.catalog.background = Some(BackgroundTrack::from_db(
            absolutize(path)?,
            volume_db,
            loop_track,
        ));
        Ok(self)
    }

    /// Files that were rejected so far.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub fn build(self) -> Catalog {
        self.catalog
    }
}

/// Errors that can occur when assembling a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid clip {path}: {reason}")]
    InvalidClip { path: PathBuf, reason: String },

    #[error("Invalid catalog: {message}")]
    ValidationError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-12);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-12);
        assert!((db_to_gain(20.0) - 10.0).abs() < 1e-9);
        assert!((db_to_gain(-15.0) - 0.177_827_941).abs() < 1e-6);
    }

    #[test]
    fn test_empty_slot_enumerates_as_single_absent_entry() {
        let slot = CategorySlot::default();
        assert_eq!(slot.entries(), vec![None]);
    }

    #[test]
    fn test_builder_skips_unsupported_extensions() {
        let builder = Catalog::builder()
            .clips(Category::Lead, ["/up/a.mp4", "/up/notes.txt", "/up/b.mov"])
            .unwrap()
            .background("/up/theme.wav", -15.0, false)
            .unwrap();
        assert_eq!(builder.skipped().len(), 2);

        let catalog = builder.build();
        let labels: Vec<_> = catalog.lead.clips().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert!(catalog.background.is_none());
    }

    #[test]
    fn test_builder_background_converts_decibels() {
        let catalog = Catalog::builder()
            .clip(Category::Body, "/up/body.mp4")
            .unwrap()
            .background("/up/theme.mp3", -20.0, true)
            .unwrap()
            .build();
        let bg = catalog.background.unwrap();
        assert!((bg.volume_factor - 0.1).abs() < 1e-12);
        assert!(bg.loop_track);
    }

    #[test]
    fn test_builder_rejects_non_finite_volume() {
        let result = Catalog::builder().background("/up/theme.mp3", f64::NAN, false);
        assert!(matches!(result, Err(CatalogError::ValidationError { .. })));
    }

    #[test]
    fn test_catalog_is_empty() {
        assert!(Catalog::default().is_empty());
        let catalog = Catalog::builder()
            .clip(Category::Middle, "/up/m.mp4")
            .unwrap()
            .build();
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_catalog_manifest_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("catalog.json");

        let catalog = Catalog::builder()
            .clips(Category::Lead, ["/up/A.mp4", "/up/B.mp4"])
            .unwrap()
            .clip(Category::Body, "/up/C.mp4")
            .unwrap()
            .background("/up/bg.mp3", 0.0, true)
            .unwrap()
            .build();
        catalog.save(&manifest).unwrap();

        let loaded = Catalog::load(&manifest).unwrap();
        assert_eq!(loaded, catalog);
        let raw = std::fs::read_to_string(&manifest).unwrap();
        assert!(raw.contains("\"loop\": true"));
    }

    #[test]
    fn test_load_rejects_traversal_label() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("catalog.json");
        std::fs::write(
            &manifest,
            r#"{"lead":[{"path":"rel/a.mp4","label":"../../escaped"}]}"#,
        )
        .unwrap();

        let result = Catalog::load(&manifest);
        assert!(matches!(result, Err(CatalogError::InvalidClip { .. })));
    }

    #[test]
    fn test_load_resolves_relative_paths_against_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("catalog.json");
        std::fs::write(
            &manifest,
            r#"{
                "body": [{"path": "rel/a.mp4", "label": "a"}],
                "background": {"path": "bg.mp3", "volume_factor": 0.5}
            }"#,
        )
        .unwrap();

        let catalog = Catalog::load(&manifest).unwrap();
        assert_eq!(catalog.body.clips()[0].path, dir.path().join("rel/a.mp4"));
        let bg = catalog.background.unwrap();
        assert_eq!(bg.path, dir.path().join("bg.mp3"));
        assert!(!bg.loop_track);
    }

    #[test]
    fn test_validate_rejects_negative_background_gain() {
        let catalog = Catalog {
            background: Some(BackgroundTrack {
                path: PathBuf::from("/bg.mp3"),
                volume_factor: -1.0,
                loop_track: false,
            }),
            ..Catalog::default()
        };
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_missing_sources_lists_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.mp4");
        std::fs::write(&present, b"").unwrap();

        let catalog = Catalog::builder()
            .clip(Category::Lead, &present)
            .unwrap()
            .clip(Category::Body, dir.path().join("gone.mp4"))
            .unwrap()
            .build();
        let missing = catalog.missing_sources();
        assert_eq!(missing, vec![dir.path().join("gone.mp4")]);
    }
}

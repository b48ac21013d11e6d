pub mod check;
pub mod config;
pub mod plan;
pub mod render;

use std::path::PathBuf;

use clap::Args;
use clipmix_catalog::{Catalog, Category};
use clipmix_common::config::AppConfig;

/// Clip inputs shared by `render` and `plan`.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Catalog manifest (JSON); clip flags are appended to it
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Lead-in clips
    #[arg(long, num_args = 1..)]
    pub lead: Vec<PathBuf>,

    /// Middle clips
    #[arg(long, num_args = 1..)]
    pub middle: Vec<PathBuf>,

    /// Body clips
    #[arg(long, num_args = 1..)]
    pub body: Vec<PathBuf>,

    /// Background track (mp3)
    #[arg(long)]
    pub background: Option<PathBuf>,

    /// Background gain in dB (defaults to the configured value)
    #[arg(long, allow_hyphen_values = true)]
    pub volume_db: Option<f64>,

    /// Loop the background track when it is shorter than the clips
    #[arg(long)]
    pub loop_background: bool,
}

impl CatalogArgs {
    /// Assemble the catalog from the manifest and command-line clips.
    pub fn into_catalog(self, config: &AppConfig) -> anyhow::Result<Catalog> {
        let base = match &self.catalog {
            Some(path) => Catalog::load(path)?,
            None => Catalog::default(),
        };

        let mut builder = Catalog::builder()
            .clips(Category::Lead, &self.lead)?
            .clips(Category::Middle, &self.middle)?
            .clips(Category::Body, &self.body)?;
        if let Some(path) = &self.background {
            let volume_db = self.volume_db.unwrap_or(config.mixing.default_volume_db);
            let loop_track = self.loop_background || config.mixing.loop_background;
            builder = builder.background(path, volume_db, loop_track)?;
        }
        for skipped in builder.skipped() {
            println!("  Skipped unsupported file: {}", skipped.display());
        }
        let extra = builder.build();

        let mut catalog = base;
        for category in Category::ALL {
            for clip in extra.slot(category).clips() {
                catalog.slot_mut(category).push(clip.clone());
            }
        }
        if extra.background.is_some() {
            catalog.background = extra.background;
        }

        catalog.validate()?;
        for missing in catalog.missing_sources() {
            tracing::warn!(path = %missing.display(), "Source file does not exist");
        }
        Ok(catalog)
    }
}

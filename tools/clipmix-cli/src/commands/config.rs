//! Config command: show or initialize the configuration file.

use std::path::PathBuf;

use clipmix_common::config::{config_file_path, AppConfig};

pub fn run(
    config: &AppConfig,
    explicit_path: Option<PathBuf>,
    init: bool,
    force: bool,
) -> anyhow::Result<()> {
    let path = explicit_path.unwrap_or_else(config_file_path);

    if !init {
        println!("# {}", path.display());
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    AppConfig::default().save_to(&path)?;
    println!("✓ Wrote default configuration to {}", path.display());
    Ok(())
}

//! Check command: external tool availability.

use clipmix_common::config::{config_file_path, AppConfig};
use clipmix_render_engine::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("ClipMix Environment Check");
    println!("=========================");
    println!();

    let mut missing = Vec::new();
    for (role, binary) in [("ffmpeg", &config.tools.ffmpeg), ("ffprobe", &config.tools.ffprobe)] {
        if command_exists(binary) {
            println!("✓ {role}: {binary}");
        } else {
            println!("✗ {role}: '{binary}' not found on PATH");
            missing.push(role);
        }
    }

    println!();
    println!("Video codec:  {}", config.encoding.video_codec);
    println!("Audio codec:  {}", config.encoding.audio_codec);
    println!("Export dir:   {}", config.export_dir.display());
    println!("Config file:  {}", config_file_path().display());
    match config.tools.transcode_timeout_secs {
        Some(secs) => println!("Timeout:      {secs}s per combination"),
        None => println!("Timeout:      none"),
    }

    if missing.is_empty() {
        println!();
        println!("All tools available.");
        Ok(())
    } else {
        anyhow::bail!("Missing tools: {}", missing.join(", "))
    }
}

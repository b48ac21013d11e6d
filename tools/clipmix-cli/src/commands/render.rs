//! Render command: every combination, written to the export directory.

use std::io::Write;
use std::time::Duration;

use clipmix_catalog::combination_count;
use clipmix_common::config::AppConfig;
use clipmix_render_engine::{render_batch, ProgressTracker};

use super::CatalogArgs;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run(config: AppConfig, inputs: CatalogArgs, json: bool) -> anyhow::Result<()> {
    let catalog = inputs.into_catalog(&config)?;
    let total = combination_count(&catalog);

    if total == 0 {
        println!("No clips given; nothing to render.");
        return Ok(());
    }

    if !json {
        println!("Rendering {total} combination(s)");
        println!("  Export dir: {}", config.export_dir.display());
        println!("  Codec:      {}", config.encoding.video_codec);
        if let Some(bg) = &catalog.background {
            println!(
                "  Background: {} (gain {:.3}{})",
                bg.path.display(),
                bg.volume_factor,
                if bg.loop_track { ", looped" } else { "" }
            );
        }
        println!();
    }

    let tracker = ProgressTracker::new();
    let poller = (!json).then(|| tokio::spawn(poll_progress(tracker.clone())));

    let result = render_batch(config, catalog, tracker).await;
    if let Some(poller) = poller {
        poller.abort();
        println!();
    }
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "Rendered {}/{} in {:.1}s",
        report.outputs.len(),
        report.total,
        report.elapsed_secs
    );
    for output in &report.outputs {
        println!("  {}  ->  {}", output.filename, output.access_url);
    }
    if !report.failures.is_empty() {
        println!();
        println!("Failed ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.label, failure.reason);
        }
    }
    Ok(())
}

/// Print the tracker whenever it changes until the task is aborted.
async fn poll_progress(tracker: ProgressTracker) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut seen = tracker.revision();
    loop {
        ticker.tick().await;
        let revision = tracker.revision();
        if revision == seen {
            continue;
        }
        seen = revision;

        let state = tracker.snapshot();
        if !state.is_batch_active {
            continue;
        }
        print!(
            "\r  [{}/{}] {:<40} {:>5.1}%",
            state.current, state.total, state.current_label, state.percent
        );
        let _ = std::io::stdout().flush();
    }
}

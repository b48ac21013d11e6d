//! Plan command: show what `render` would run.

use clipmix_catalog::enumerate;
use clipmix_common::config::AppConfig;
use clipmix_render_engine::{ExportSpace, FfprobeProbe, PlanBuilder};

use super::CatalogArgs;

pub fn run(config: &AppConfig, inputs: CatalogArgs, json: bool) -> anyhow::Result<()> {
    let catalog = inputs.into_catalog(config)?;
    let combinations = enumerate(&catalog);

    let planner = PlanBuilder::new(
        config.encoding.clone(),
        Box::new(FfprobeProbe::new(config.tools.ffprobe.clone())),
    );
    let export = ExportSpace::new(&config.export_dir, &config.url_prefix);

    let mut plans = Vec::with_capacity(combinations.len());
    for combination in &combinations {
        let filename = combination.output_filename(&config.encoding.container);
        match planner.build(
            combination,
            catalog.background.as_ref(),
            &export.output_path(&filename),
        ) {
            Ok(plan) => plans.push(plan),
            Err(e) => {
                if !json {
                    println!("✗ {}: {e}", combination.label());
                }
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    if combinations.is_empty() {
        println!("No clips given; nothing to plan.");
        return Ok(());
    }

    println!("{} combination(s), {} planned", combinations.len(), plans.len());
    for plan in &plans {
        println!();
        println!("{}", plan.label);
        println!("  Output:   {}", plan.output_path.display());
        match plan.expected_duration_secs {
            Some(secs) => println!("  Duration: {secs:.2}s"),
            None => println!("  Duration: unknown (no progress)"),
        }
        if let Some(bg) = &plan.background {
            println!("  Mix:      {}", bg.policy.as_str());
        }
        println!("  Command:  {} {}", config.tools.ffmpeg, shell_join(&plan.args));
    }
    Ok(())
}

/// Join arguments into a line that can be pasted into a POSIX shell.
fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./:+=,".contains(c));
            if plain {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_join_quotes_filter_graphs() {
        let args = vec![
            "-i".to_string(),
            "/tmp/a b.mp4".to_string(),
            "-filter_complex".to_string(),
            "[0:v]setsar=1[vi]".to_string(),
            "it's".to_string(),
        ];
        assert_eq!(
            shell_join(&args),
            r"-i '/tmp/a b.mp4' -filter_complex '[0:v]setsar=1[vi]' 'it'\''s'"
        );
    }

    #[test]
    fn test_shell_join_leaves_plain_args() {
        let args = vec!["-movflags".to_string(), "+faststart".to_string()];
        assert_eq!(shell_join(&args), "-movflags +faststart");
    }
}

//! Batch orchestration: enumerate → plan → transcode, one combination at a
//! time.

use std::collections::HashSet;
use std::time::Instant;

use clipmix_catalog::{enumerate, Catalog};
use clipmix_common::config::AppConfig;
use clipmix_common::error::{ClipmixError, ClipmixResult};
use serde::Serialize;

use crate::executor::{FfmpegBackend, TranscodeBackend, TranscodeExecutor};
use crate::filter_graph::PlanBuilder;
use crate::output::{ExportSpace, OutputDescriptor};
use crate::probe::{DurationProbe, FfprobeProbe};
use crate::progress::ProgressTracker;

/// A combination that did not produce an output.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCombination {
    pub label: String,
    pub reason: String,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Wall-clock start (RFC 3339).
    pub started_at: String,

    /// Wall-clock end (RFC 3339).
    pub finished_at: String,

    pub elapsed_secs: f64,

    /// Combinations attempted.
    pub total: usize,

    /// Successful outputs, in combination order.
    pub outputs: Vec<OutputDescriptor>,

    pub failures: Vec<FailedCombination>,
}

/// Drives a catalog through planning and transcoding.
pub struct BatchOrchestrator {
    planner: PlanBuilder,
    executor: TranscodeExecutor,
    export: ExportSpace,
    tracker: ProgressTracker,
    container: String,
}

impl BatchOrchestrator {
    /// Orchestrator backed by `ffprobe` and `ffmpeg` as configured.
    pub fn from_config(config: &AppConfig, tracker: ProgressTracker) -> Self {
        Self::with_components(
            config,
            Box::new(FfprobeProbe::new(config.tools.ffprobe.clone())),
            Box::new(FfmpegBackend::from_config(&config.tools)),
            tracker,
        )
    }

    /// Orchestrator with custom probe and backend.
    pub fn with_components(
        config: &AppConfig,
        probe: Box<dyn DurationProbe>,
        backend: Box<dyn TranscodeBackend>,
        tracker: ProgressTracker,
    ) -> Self {
        Self {
            planner: PlanBuilder::new(config.encoding.clone(), probe),
            executor: TranscodeExecutor::new(backend, tracker.clone()),
            export: ExportSpace::new(config.export_dir.clone(), config.url_prefix.clone()),
            tracker,
            container: config.encoding.container.clone(),
        }
    }

    /// Render every combination and return the successful outputs.
    ///
    /// Callers should treat a list shorter than the combination count as
    /// partial failure; individual errors are only logged.
    pub fn run(&mut self, catalog: &Catalog) -> ClipmixResult<Vec<OutputDescriptor>> {
        self.run_with_report(catalog).map(|report| report.outputs)
    }

    /// Like [`run`](Self::run), also returning timing and failures.
    pub fn run_with_report(&mut self, catalog: &Catalog) -> ClipmixResult<BatchReport> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let started = Instant::now();

        let combinations = enumerate(catalog);
        let total = combinations.len();
        if total == 0 {
            tracing::info!("Catalog has no clips; nothing to render");
            return Ok(BatchReport {
                started_at,
                finished_at: chrono::Utc::now().to_rfc3339(),
                elapsed_secs: started.elapsed().as_secs_f64(),
                total,
                outputs: Vec::new(),
                failures: Vec::new(),
            });
        }

        catalog
            .validate()
            .map_err(|e| ClipmixError::catalog(e.to_string()))?;

        if !self.executor.backend_available() {
            return Err(ClipmixError::ToolMissing {
                tool: self.executor.backend_name().to_string(),
            });
        }

        self.export.prepare()?;

        tracing::info!(
            combinations = total,
            background = catalog.background.is_some(),
            backend = self.executor.backend_name(),
            "Starting batch"
        );
        self.tracker.update(0, total, combinations[0].label());

        let mut outputs = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut claimed = HashSet::with_capacity(total);
        for (index, combination) in combinations.iter().enumerate() {
            let label = combination.label();
            self.tracker.update(outputs.len(), total, label);

            // Clips from different files can share a label; the later one
            // would overwrite the earlier output.
            if !claimed.insert(label) {
                tracing::warn!(label, "Duplicate combination label; skipping");
                failures.push(FailedCombination {
                    label: label.to_string(),
                    reason: "duplicate label would overwrite an earlier output".to_string(),
                });
                continue;
            }

            let filename = combination.output_filename(&self.container);
            let output_path = self.export.output_path(&filename);
            let result = self
                .planner
                .build(combination, catalog.background.as_ref(), &output_path)
                .and_then(|plan| self.executor.execute(&plan));

            match result {
                Ok(()) => {
                    outputs.push(self.export.descriptor(&filename));
                    self.tracker.update(outputs.len(), total, label);
                    tracing::info!(
                        label,
                        position = index + 1,
                        total,
                        "Combination rendered"
                    );
                }
                Err(e) if e.is_per_combination() => {
                    tracing::warn!(label, error = %e, "Combination failed; continuing");
                    failures.push(FailedCombination {
                        label: label.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!(label, error = %e, "Batch aborted");
                    self.tracker.reset();
                    return Err(e);
                }
            }
        }

        self.tracker.reset();

        let report = BatchReport {
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            total,
            outputs,
            failures,
        };
        tracing::info!(
            rendered = report.outputs.len(),
            failed = report.failures.len(),
            elapsed_secs = report.elapsed_secs,
            "Batch finished"
        );
        Ok(report)
    }
}

/// Run a batch with the configured tools on a blocking worker thread.
///
/// `tracker` can be polled from async tasks while the batch runs.
pub async fn render_batch(
    config: AppConfig,
    catalog: Catalog,
    tracker: ProgressTracker,
) -> ClipmixResult<BatchReport> {
    tokio::task::spawn_blocking(move || {
        let mut orchestrator = BatchOrchestrator::from_config(&config, tracker);
        orchestrator.run_with_report(&catalog)
    })
    .await
    .map_err(|e| ClipmixError::render(format!("Batch worker failed: {e}")))?
}

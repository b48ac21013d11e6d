//! Transcoder supervision.
//!
//! The subprocess sits behind a reader thread that turns its stdout into
//! [`ProgressEvent`]s; the calling thread consumes those events, feeds the
//! [`ProgressTracker`], and enforces the optional per-invocation timeout.

use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use clipmix_common::config::ToolConfig;
use clipmix_common::error::{ClipmixError, ClipmixResult};

use crate::filter_graph::TranscodePlan;
use crate::progress::{completion_percent, ProgressEvent, ProgressEvents, ProgressTracker};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const STALL_WARNING: Duration = Duration::from_secs(10);
const STDERR_TAIL_LINES: usize = 20;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something that can run a [`TranscodePlan`] to completion.
pub trait TranscodeBackend: Send {
    /// Run the plan, handing every progress event to `on_event` as it
    /// arrives. Returns once the transcode has exited.
    fn transcode(
        &mut self,
        plan: &TranscodePlan,
        on_event: &mut dyn FnMut(ProgressEvent),
    ) -> ClipmixResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Runs plans through the `ffmpeg` command-line tool.
pub struct FfmpegBackend {
    binary: String,
    timeout: Option<Duration>,
}

impl FfmpegBackend {
    pub fn new(binary: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(tools: &ToolConfig) -> Self {
        Self::new(
            tools.ffmpeg.clone(),
            tools.transcode_timeout_secs.map(Duration::from_secs),
        )
    }
}

impl TranscodeBackend for FfmpegBackend {
    fn transcode(
        &mut self,
        plan: &TranscodePlan,
        on_event: &mut dyn FnMut(ProgressEvent),
    ) -> ClipmixResult<()> {
        tracing::debug!(args = ?plan.args, "Running ffmpeg");
        let mut child = Command::new(&self.binary)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClipmixError::ToolMissing {
                        tool: self.binary.clone(),
                    }
                } else {
                    ClipmixError::render(format!("Failed to start {}: {e}", self.binary))
                }
            })?;

        let started = Instant::now();
        tracing::info!(
            pid = child.id(),
            label = %plan.label,
            inputs = plan.inputs.len(),
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipmixError::render("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClipmixError::render("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let (tx, rx) = mpsc::channel();
        let reader_task = std::thread::spawn(move || {
            for event in ProgressEvents::new(BufReader::new(stdout)) {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        let deadline = self.timeout.map(|timeout| started + timeout);
        let mut last_event = Instant::now();
        let mut timed_out = false;
        loop {
            let wait = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };
            match rx.recv_timeout(wait) {
                Ok(event) => {
                    last_event = Instant::now();
                    on_event(event);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        kill_on_timeout(&mut child, plan, started);
                        timed_out = true;
                        break;
                    }
                    if last_event.elapsed() >= STALL_WARNING {
                        tracing::warn!(
                            label = %plan.label,
                            elapsed_secs = started.elapsed().as_secs_f64(),
                            "No ffmpeg progress for 10s"
                        );
                        last_event = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // stdout can close before the process exits; keep enforcing the
        // deadline until it does.
        let wait_error =
            |e: std::io::Error| ClipmixError::render(format!("Failed to wait on ffmpeg: {e}"));
        let status = loop {
            if let Some(status) = child.try_wait().map_err(wait_error)? {
                break status;
            }
            if timed_out {
                break child.wait().map_err(wait_error)?;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                kill_on_timeout(&mut child, plan, started);
                timed_out = true;
                continue;
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        };
        reader_task.join().ok();
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if timed_out {
            return Err(ClipmixError::TranscodeTimeout {
                label: plan.label.clone(),
                secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            });
        }

        if !status.success() {
            return Err(ClipmixError::ExternalToolFailure {
                tool: self.binary.clone(),
                label: plan.label.clone(),
                code: status.code(),
                stderr: stderr_tail(&stderr_output, STDERR_TAIL_LINES),
            });
        }

        tracing::info!(
            label = %plan.label,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn kill_on_timeout(child: &mut Child, plan: &TranscodePlan, started: Instant) {
    tracing::warn!(
        label = %plan.label,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "ffmpeg exceeded its time limit; killing"
    );
    if let Err(e) = child.kill() {
        tracing::warn!(error = %e, "Failed to kill ffmpeg");
    }
}

/// Runs one plan on a backend and publishes its progress.
pub struct TranscodeExecutor {
    backend: Box<dyn TranscodeBackend>,
    tracker: ProgressTracker,
}

impl TranscodeExecutor {
    pub fn new(backend: Box<dyn TranscodeBackend>, tracker: ProgressTracker) -> Self {
        Self { backend, tracker }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn backend_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Transcode `plan`. Success or failure is decided by the backend's
    /// exit status alone; unusable progress lines are only skipped.
    pub fn execute(&mut self, plan: &TranscodePlan) -> ClipmixResult<()> {
        let tracker = self.tracker.clone();
        let label = plan.label.as_str();
        let expected = plan.expected_duration_secs;
        let mut skipped = 0usize;

        tracker.report_percent(label, 0.0);
        let mut on_event = |event: ProgressEvent| match event {
            ProgressEvent::OutTime(secs) => match completion_percent(secs, expected) {
                Ok(percent) => tracker.report_percent(label, percent),
                Err(reason) => {
                    skipped += 1;
                    tracing::trace!(?reason, "Skipping progress line");
                }
            },
            ProgressEvent::End => tracker.report_percent(label, 100.0),
            ProgressEvent::Skip(reason) => {
                skipped += 1;
                tracing::trace!(?reason, "Skipping progress line");
            }
            ProgressEvent::Continue | ProgressEvent::Other => {}
        };

        let result = self.backend.transcode(plan, &mut on_event);
        if skipped > 0 {
            tracing::debug!(label, skipped, "Progress lines skipped");
        }
        result
    }
}

/// Last `max_lines` non-empty lines of a stderr capture.
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Whether `binary` resolves to an executable (a path, or a name found
/// in one of the `PATH` directories).
pub fn command_exists(binary: &str) -> bool {
    if binary.is_empty() {
        return false;
    }
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return is_executable(candidate);
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(binary))))
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_graph::{FilterGraph, TranscodePlan};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Replays canned events and records the tracker's percentage after each.
    struct ScriptedBackend {
        events: Vec<ProgressEvent>,
        exit_code: Option<i32>,
        tracker: ProgressTracker,
        seen: Arc<Mutex<Vec<f64>>>,
    }

    impl TranscodeBackend for ScriptedBackend {
        fn transcode(
            &mut self,
            plan: &TranscodePlan,
            on_event: &mut dyn FnMut(ProgressEvent),
        ) -> ClipmixResult<()> {
            for event in self.events.drain(..) {
                on_event(event);
                self.seen.lock().unwrap().push(self.tracker.snapshot().percent);
            }
            match self.exit_code {
                Some(0) | None => Ok(()),
                code => Err(ClipmixError::ExternalToolFailure {
                    tool: "fake".to_string(),
                    label: plan.label.clone(),
                    code,
                    stderr: String::new(),
                }),
            }
        }

        fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn plan(expected: Option<f64>) -> TranscodePlan {
        TranscodePlan {
            label: "A_lead-skip_C".to_string(),
            inputs: vec![PathBuf::from("/a.mp4")],
            graph: FilterGraph {
                spec: String::new(),
                video_out: "[vid]",
                audio_out: "[aud]",
            },
            background: None,
            expected_duration_secs: expected,
            output_path: PathBuf::from("/out/A_lead-skip_C.mp4"),
            args: vec![],
        }
    }

    fn run(
        events: Vec<ProgressEvent>,
        exit_code: Option<i32>,
        expected: Option<f64>,
    ) -> (ClipmixResult<()>, Vec<f64>, ProgressTracker) {
        let tracker = ProgressTracker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = ScriptedBackend {
            events,
            exit_code,
            tracker: tracker.clone(),
            seen: seen.clone(),
        };
        let mut executor = TranscodeExecutor::new(Box::new(backend), tracker.clone());
        let result = executor.execute(&plan(expected));
        let seen = seen.lock().unwrap().clone();
        (result, seen, tracker)
    }

    #[test]
    fn test_out_time_events_become_percentages() {
        let (result, seen, tracker) = run(
            vec![
                ProgressEvent::OutTime(2.0),
                ProgressEvent::Continue,
                ProgressEvent::OutTime(4.0),
                ProgressEvent::End,
            ],
            None,
            Some(8.0),
        );
        assert!(result.is_ok());
        assert_eq!(seen, vec![25.0, 25.0, 50.0, 100.0]);
        assert_eq!(tracker.snapshot().current_label, "A_lead-skip_C");
    }

    #[test]
    fn test_unknown_duration_skips_reporting_but_not_the_job() {
        let (result, seen, _) = run(
            vec![ProgressEvent::OutTime(2.0), ProgressEvent::OutTime(3.0)],
            None,
            Some(0.0),
        );
        assert!(result.is_ok());
        assert_eq!(seen, vec![0.0, 0.0]);
    }

    #[test]
    fn test_malformed_lines_do_not_fail_the_job() {
        let (result, seen, _) = run(
            vec![
                crate::progress::parse_progress_line("not a progress line"),
                ProgressEvent::OutTime(5.0),
            ],
            None,
            Some(10.0),
        );
        assert!(result.is_ok());
        assert_eq!(seen, vec![0.0, 50.0]);
    }

    #[test]
    fn test_nonzero_exit_is_external_tool_failure() {
        let (result, _, _) = run(vec![ProgressEvent::OutTime(1.0)], Some(1), Some(10.0));
        match result {
            Err(ClipmixError::ExternalToolFailure { code, label, .. }) => {
                assert_eq!(code, Some(1));
                assert_eq!(label, "A_lead-skip_C");
            }
            other => panic!("expected ExternalToolFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = "a\n\nb\nc\n  \nd\n";
        assert_eq!(stderr_tail(stderr, 2), "c\nd");
        assert_eq!(stderr_tail(stderr, 10), "a\nb\nc\nd");
        assert_eq!(stderr_tail("", 3), "");
    }

    #[test]
    fn test_missing_ffmpeg_binary_is_tool_missing() {
        let mut backend = FfmpegBackend::new("clipmix-definitely-not-a-real-binary", None);
        assert!(!backend.is_available());
        let err = backend
            .transcode(&plan(Some(1.0)), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, ClipmixError::ToolMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_ffmpeg_backend_parses_real_subprocess_output() {
        // `sh` stands in for ffmpeg: it prints a progress block and exits 3.
        let mut backend = FfmpegBackend::new("sh", None);
        let mut plan = plan(Some(2.0));
        plan.args = vec![
            "-c".to_string(),
            "printf 'out_time_us=1000000\\nprogress=end\\n'; echo boom >&2; exit 3".to_string(),
        ];
        let mut events = Vec::new();
        let err = backend
            .transcode(&plan, &mut |e| events.push(e))
            .unwrap_err();
        assert_eq!(events, vec![ProgressEvent::OutTime(1.0), ProgressEvent::End]);
        match err {
            ClipmixError::ExternalToolFailure { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected ExternalToolFailure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exists_searches_path_without_a_shell() {
        assert!(command_exists("sh"));
        assert!(command_exists("/bin/sh"));
        assert!(!command_exists(""));
        assert!(!command_exists("sh; exit 0"));
        assert!(!command_exists("clipmix-definitely-not-a-real-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_applies_after_stdout_closes() {
        // Closes both pipes first, so only the exit wait can enforce the limit.
        let mut backend = FfmpegBackend::new("sh", Some(Duration::from_millis(200)));
        let mut plan = plan(None);
        plan.args = vec!["-c".to_string(), "exec >&- 2>&-; exec sleep 30".to_string()];
        let started = Instant::now();
        let err = backend.transcode(&plan, &mut |_| {}).unwrap_err();
        assert!(matches!(err, ClipmixError::TranscodeTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_ffmpeg_backend_kills_after_timeout() {
        let mut backend = FfmpegBackend::new("sh", Some(Duration::from_millis(200)));
        let mut plan = plan(None);
        plan.args = vec!["-c".to_string(), "exec sleep 30".to_string()];
        let started = Instant::now();
        let err = backend.transcode(&plan, &mut |_| {}).unwrap_err();
        assert!(matches!(err, ClipmixError::TranscodeTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}

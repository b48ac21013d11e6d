//! Batch progress state and `-progress pipe:1` stream parsing.

use std::io::BufRead;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

/// Snapshot of the running batch, as handed to pollers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// Combinations rendered successfully so far.
    pub current: usize,

    /// Combinations in the batch.
    pub total: usize,

    /// Label of the combination being rendered.
    pub current_label: String,

    pub is_batch_active: bool,

    /// Completion of the current combination, 0.0 to 100.0.
    pub percent: f64,
}

/// Called with the new state after every tracker mutation.
pub type ProgressObserver = Box<dyn Fn(&ProgressState) + Send>;

#[derive(Default)]
struct TrackerInner {
    state: ProgressState,
    revision: u64,
    observer: Option<ProgressObserver>,
}

impl TrackerInner {
    fn changed(&mut self) {
        self.revision += 1;
        if let Some(observer) = &self.observer {
            observer(&self.state);
        }
    }
}

/// Shared handle to the batch progress.
///
/// One writer (the batch worker) mutates it; any number of readers take
/// snapshots. Clones share the same state.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Mutex<TrackerInner>>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ProgressTracker")
            .field("state", &inner.state)
            .field("revision", &inner.revision)
            .finish()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that also pushes every change to `observer`. The observer
    /// runs under the tracker lock and must not call back into it.
    pub fn with_observer(observer: ProgressObserver) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner {
                observer: Some(observer),
                ..TrackerInner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set position, size, and label; marks the batch active and clears
    /// the per-combination percentage when the label changes.
    pub fn update(&self, current: usize, total: usize, label: &str) {
        let mut inner = self.lock();
        if inner.state.current_label != label {
            inner.state.percent = 0.0;
        }
        inner.state.current = current;
        inner.state.total = total;
        inner.state.current_label = label.to_string();
        inner.state.is_batch_active = true;
        inner.changed();
    }

    /// Record how far the transcode of `label` has progressed.
    pub fn report_percent(&self, label: &str, percent: f64) {
        let mut inner = self.lock();
        inner.state.current_label = label.to_string();
        inner.state.percent = percent.clamp(0.0, 100.0);
        inner.changed();
    }

    /// Zero every field and mark the batch idle.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = ProgressState::default();
        inner.changed();
    }

    pub fn snapshot(&self) -> ProgressState {
        self.lock().state.clone()
    }

    /// Number of mutations so far. Pollers can skip unchanged snapshots.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }
}

/// Why a progress line did not yield a usable percentage.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Blank,
    /// Line is not `key=value`.
    Malformed(String),
    /// Elapsed-time value could not be parsed (ffmpeg prints `N/A` early on).
    UnparsableTime(String),
    /// No usable expected duration to divide by.
    UnknownDuration,
}

/// One parsed line of the transcoder's progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Elapsed output time in seconds.
    OutTime(f64),
    /// `progress=continue`: end of one progress block.
    Continue,
    /// `progress=end`: the transcoder finished writing.
    End,
    /// A well-formed key this crate does not track (`frame`, `fps`, ...).
    Other,
    /// A line that was ignored.
    Skip(SkipReason),
}

/// Parse a single `key=value` progress line.
pub fn parse_progress_line(line: &str) -> ProgressEvent {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ProgressEvent::Skip(SkipReason::Blank);
    }

    let Some((key, value)) = trimmed.split_once('=') else {
        return ProgressEvent::Skip(SkipReason::Malformed(trimmed.to_string()));
    };

    match key.trim() {
        // Both keys carry microseconds; `out_time_ms` is misnamed upstream.
        "out_time_us" | "out_time_ms" => match value.trim().parse::<f64>() {
            Ok(us) if us.is_finite() => ProgressEvent::OutTime(us / 1_000_000.0),
            _ => ProgressEvent::Skip(SkipReason::UnparsableTime(value.trim().to_string())),
        },
        "progress" => {
            if value.trim() == "end" {
                ProgressEvent::End
            } else {
                ProgressEvent::Continue
            }
        }
        "" => ProgressEvent::Skip(SkipReason::Malformed(trimmed.to_string())),
        _ => ProgressEvent::Other,
    }
}

/// Percentage of `expected_secs` covered by `out_time_secs`, clamped to
/// `[0, 100]`.
pub fn completion_percent(out_time_secs: f64, expected_secs: Option<f64>) -> Result<f64, SkipReason> {
    match expected_secs {
        Some(expected) if expected.is_finite() && expected > 0.0 => {
            Ok((out_time_secs / expected * 100.0).clamp(0.0, 100.0))
        }
        _ => Err(SkipReason::UnknownDuration),
    }
}

/// Blocking iterator over the events of a progress stream.
///
/// Ends at EOF or on the first read error.
pub struct ProgressEvents<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> ProgressEvents<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for ProgressEvents<R> {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.line.clear();
        match self.reader.read_line(&mut self.line) {
            Ok(0) => None,
            Ok(_) => Some(parse_progress_line(&self.line)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed reading progress stream");
                None
            }
        }
    }
}

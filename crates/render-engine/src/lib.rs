//! ClipMix Render Engine
//!
//! Turns a clip catalog into a batch of `ffmpeg` invocations, one per
//! combination, and tracks their progress.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Catalog ── enumerate ──▶ Combination ──┐
//!                                        ├── PlanBuilder (probe, filter graph, args)
//! BackgroundTrack ───────────────────────┘         │
//!                                                  ▼
//!                                     TranscodeExecutor (ffmpeg -progress pipe:1)
//!                                                  │
//!                                   ProgressTracker ◀── percent / label
//!                                                  │
//!                                                  ▼
//!                                    ExportSpace/<label>.mp4
//! ```

pub mod batch;
pub mod executor;
pub mod filter_graph;
pub mod output;
pub mod probe;
pub mod progress;

pub use batch::*;
pub use executor::*;
pub use filter_graph::*;
pub use output::*;
pub use probe::*;
pub use progress::*;

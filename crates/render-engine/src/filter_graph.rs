//! Filter graph and argument construction for one combination.
//!
//! ```text
//! clip 0 ──setsar/format/aresample──┐
//! clip 1 ──setsar/format/aresample──┼── concat ──[vid]─────────────────────▶ video
//! clip N ──setsar/format/aresample──┘        └──[aud]──┬── amix ──[outa]──▶ audio
//! background ──(tile)──volume──asetpts──[bg]───────────┘
//! ```

use std::path::{Path, PathBuf};

use clipmix_catalog::{BackgroundTrack, Combination};
use clipmix_common::config::EncodingConfig;
use clipmix_common::error::{ClipmixError, ClipmixResult};
use serde::Serialize;

use crate::probe::DurationProbe;

/// Output node of the concatenated video stream.
pub const VIDEO_OUT: &str = "[vid]";
/// Output node of the concatenated clip audio.
pub const CONCAT_AUDIO_OUT: &str = "[aud]";
/// Output node of the mixed audio when a background track is present.
pub const MIXED_AUDIO_OUT: &str = "[outa]";

/// How `amix` decides the length of the mixed audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MixPolicy {
    /// Output lasts as long as the longer input.
    Longest,
    /// Output follows the first input (the clip audio).
    First,
}

impl MixPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MixPolicy::Longest => "longest",
            MixPolicy::First => "first",
        }
    }
}

/// Pick the mix policy for a background track.
///
/// Looping only applies when the track is actually shorter than the clips;
/// a long-enough track is mixed as if looping were off.
pub fn select_mix_policy(loop_track: bool, track_secs: f64, total_secs: f64) -> MixPolicy {
    if loop_track && track_secs > 0.0 && track_secs < total_secs {
        MixPolicy::Longest
    } else {
        MixPolicy::First
    }
}

/// Number of times a background track is tiled to cover `total_secs`:
/// `⌈total / track⌉ + 1`.
pub fn loop_tiles(track_secs: f64, total_secs: f64) -> u32 {
    if track_secs <= 0.0 || total_secs <= 0.0 {
        return 1;
    }
    ((total_secs / track_secs).ceil() as u32).saturating_add(1)
}

/// Resolved background treatment for one combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundMix {
    /// Input index of the background track (after all clips).
    pub input_index: usize,

    /// Linear gain.
    pub volume_factor: f64,

    /// Duration policy passed to `amix`.
    pub policy: MixPolicy,

    /// Tiling, present only when the track is looped.
    pub tiling: Option<Tiling>,
}

/// Parameters of a tiled background track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tiling {
    /// Total number of copies of the track.
    pub tiles: u32,

    /// Track length in samples at the normalized sample rate.
    pub track_samples: u64,

    /// Length the tiled track is trimmed to.
    pub trim_secs: f64,
}

impl BackgroundMix {
    /// Decide how to mix `track` under clips that last `total_secs`.
    pub fn resolve(
        track: &BackgroundTrack,
        input_index: usize,
        track_secs: f64,
        total_secs: f64,
        sample_rate: u32,
    ) -> Self {
        let policy = select_mix_policy(track.loop_track, track_secs, total_secs);
        let tiling = match policy {
            MixPolicy::Longest => Some(Tiling {
                tiles: loop_tiles(track_secs, total_secs),
                track_samples: (track_secs * sample_rate as f64).ceil() as u64,
                trim_secs: total_secs,
            }),
            MixPolicy::First => None,
        };
        Self {
            input_index,
            volume_factor: track.volume_factor,
            policy,
            tiling,
        }
    }
}

/// A complete `-filter_complex` graph and its output nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterGraph {
    pub spec: String,
    pub video_out: &'static str,
    pub audio_out: &'static str,
}

/// Build the normalize → concat → (mix) graph for `input_count` clips.
pub fn build_filter_graph(
    input_count: usize,
    background: Option<&BackgroundMix>,
    pixel_format: &str,
    sample_rate: u32,
) -> FilterGraph {
    let mut parts = Vec::with_capacity(input_count * 2 + 3);

    for i in 0..input_count {
        parts.push(format!("[{i}:v]setsar=1,format={pixel_format}[v{i}]"));
        parts.push(format!("[{i}:a]aresample={sample_rate}[a{i}]"));
    }

    let concat_inputs: String = (0..input_count).map(|i| format!("[v{i}][a{i}]")).collect();
    parts.push(format!(
        "{concat_inputs}concat=n={input_count}:v=1:a=1{VIDEO_OUT}{CONCAT_AUDIO_OUT}"
    ));

    let audio_out = match background {
        Some(bg) => {
            let idx = bg.input_index;
            let mut chain = Vec::new();
            if let Some(tiling) = &bg.tiling {
                chain.push(format!("aresample={sample_rate}"));
                chain.push(format!(
                    "aloop=loop={}:size={}",
                    tiling.tiles.saturating_sub(1),
                    tiling.track_samples
                ));
                chain.push(format!("atrim=duration={:.6}", tiling.trim_secs));
            }
            chain.push(format!("volume={}", bg.volume_factor));
            chain.push("asetpts=PTS-STARTPTS".to_string());

            parts.push(format!("[{idx}:a]{}[bg]", chain.join(",")));
            parts.push(format!(
                "{CONCAT_AUDIO_OUT}[bg]amix=inputs=2:duration={}{MIXED_AUDIO_OUT}",
                bg.policy.as_str()
            ));
            MIXED_AUDIO_OUT
        }
        None => CONCAT_AUDIO_OUT,
    };

    FilterGraph {
        spec: parts.join(";"),
        video_out: VIDEO_OUT,
        audio_out,
    }
}

/// Encoder arguments for the configured codecs.
pub fn codec_args(encoding: &EncodingConfig) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        encoding.video_codec.clone(),
        "-preset".to_string(),
        encoding.preset.clone(),
        "-c:a".to_string(),
        encoding.audio_codec.clone(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}

/// Everything needed to render one combination.
#[derive(Debug, Clone, Serialize)]
pub struct TranscodePlan {
    /// Combination label, also the output file stem.
    pub label: String,

    /// Clip inputs in concatenation order, background last.
    pub inputs: Vec<PathBuf>,

    pub graph: FilterGraph,

    pub background: Option<BackgroundMix>,

    /// Summed clip duration, used as the progress denominator.
    pub expected_duration_secs: Option<f64>,

    pub output_path: PathBuf,

    /// Full argument vector for the transcoder (without the binary).
    pub args: Vec<String>,
}

/// Turns combinations into [`TranscodePlan`]s.
pub struct PlanBuilder {
    encoding: EncodingConfig,
    probe: Box<dyn DurationProbe>,
}

impl PlanBuilder {
    pub fn new(encoding: EncodingConfig, probe: Box<dyn DurationProbe>) -> Self {
        Self { encoding, probe }
    }

    /// Build the plan for `combination`.
    ///
    /// With a background track, probe failures abort this plan. Without
    /// one, durations only drive progress reporting and a failed probe
    /// leaves the expected duration unknown.
    pub fn build(
        &self,
        combination: &Combination<'_>,
        background: Option<&BackgroundTrack>,
        output_path: &Path,
    ) -> ClipmixResult<TranscodePlan> {
        let clip_paths = combination.clip_paths();
        if clip_paths.is_empty() {
            return Err(ClipmixError::render(format!(
                "combination {} has no clips",
                combination.label()
            )));
        }

        let (expected_duration_secs, mix) = match background {
            Some(track) => {
                let total_secs = self.probe.total_duration(&clip_paths)?;
                let track_secs = self.probe.probe_duration(&track.path)?;
                let mix = BackgroundMix::resolve(
                    track,
                    clip_paths.len(),
                    track_secs,
                    total_secs,
                    self.encoding.audio_sample_rate,
                );
                tracing::debug!(
                    label = combination.label(),
                    total_secs,
                    track_secs,
                    policy = mix.policy.as_str(),
                    tiles = ?mix.tiling.map(|t| t.tiles),
                    "Resolved background mix"
                );
                (Some(total_secs), Some(mix))
            }
            None => match self.probe.total_duration(&clip_paths) {
                Ok(total) => (Some(total), None),
                Err(e) => {
                    tracing::warn!(
                        label = combination.label(),
                        error = %e,
                        "Could not probe clip durations; progress will not be reported"
                    );
                    (None, None)
                }
            },
        };

        let graph = build_filter_graph(
            clip_paths.len(),
            mix.as_ref(),
            &self.encoding.pixel_format,
            self.encoding.audio_sample_rate,
        );

        let mut inputs: Vec<PathBuf> = clip_paths.iter().map(|p| p.to_path_buf()).collect();
        if let Some(track) = background {
            inputs.push(track.path.clone());
        }

        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
        ];
        for input in &inputs {
            args.push("-i".to_string());
            args.push(input.display().to_string());
        }
        args.push("-filter_complex".to_string());
        args.push(graph.spec.clone());
        args.push("-map".to_string());
        args.push(graph.video_out.to_string());
        args.push("-map".to_string());
        args.push(graph.audio_out.to_string());
        args.append(&mut codec_args(&self.encoding));
        args.push(output_path.display().to_string());

        Ok(TranscodePlan {
            label: combination.label().to_string(),
            inputs,
            graph,
            background: mix,
            expected_duration_secs,
            output_path: output_path.to_path_buf(),
            args,
        })
    }
}

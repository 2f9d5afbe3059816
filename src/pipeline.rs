//! C7 — Pipeline orchestrator: wires C3 → C4 → C5 → C6 over a caller-supplied
//! audio buffer and pitch track, producing the external `Result` map.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::classifier::{classify_frame, ClassifierInput, RegisterLabel};
use crate::config::{MIN_INPUT_SECONDS, SILENCE_PEAK_FLOOR};
use crate::error::{VocalRangeError, VocalRangeResult};
use crate::filter::{filter_registers, LabeledFrame};
use crate::pitch_track::{AudioBuffer, PitchTrack};
use crate::postprocess::post_process;
use crate::summary::summarize;

/// Half-width (in samples) of the window handed to the feature extractor,
/// centered on each frame's original sample offset.
const FEATURE_WINDOW_HALF_SAMPLES: usize = 1024;

/// Everything the orchestrator needs for one invocation (spec.md §6).
pub struct AnalysisInput {
    pub audio: AudioBuffer,
    pub pitch_track: PitchTrack,
    /// Hint that instrument bleed has already been removed. Reserved,
    /// currently informational only (spec.md §6).
    pub already_separated: bool,
    /// Suppress register classification; treat all retained frames as chest
    /// and use the no-falsetto outlier parameters.
    pub no_falsetto: bool,
}

/// The orchestrator's internal state-machine stages (spec.md §4.7). Each
/// variant name also doubles as what gets logged on entry, for traceability
/// without making diagnostics part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Loaded,
    Preprocessed,
    Tracked,
    Filtered,
    Classified,
    Summarized,
}

fn validate_input(audio: &AudioBuffer) -> VocalRangeResult<()> {
    if audio.duration_seconds() < MIN_INPUT_SECONDS {
        return Err(VocalRangeError::TooShort {
            got_secs: audio.duration_seconds(),
            min_secs: MIN_INPUT_SECONDS,
        });
    }
    let peak = audio.peak_amplitude();
    if peak < SILENCE_PEAK_FLOOR {
        return Err(VocalRangeError::Silent { peak, floor: SILENCE_PEAK_FLOOR });
    }
    Ok(())
}

/// The external `Result` contract (spec.md §3): recognized keys, with missing
/// register sections simply absent rather than null. Mirrors the teacher's
/// `#[derive(Serialize)]` response structs (`models.rs::AnalysisResult`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutput {
    pub overall_min: String,
    pub overall_min_hz: f32,
    pub overall_max: String,
    pub overall_max_hz: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest_min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest_min_hz: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest_max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest_max_hz: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest_avg_hz: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest_ratio: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub falsetto_min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub falsetto_min_hz: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub falsetto_max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub falsetto_max_hz: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub falsetto_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub falsetto_ratio: Option<f32>,
}

/// Run the full pipeline. Fatal conditions short-circuit with `Err`; callers
/// translate that into the `{error: message}` map via [`to_result_map`].
pub fn analyze(input: &AnalysisInput) -> VocalRangeResult<AnalysisOutput> {
    log::debug!("stage: {:?}", Stage::Loaded);
    validate_input(&input.audio)?;

    log::debug!("stage: {:?}", Stage::Preprocessed);
    let normalized = input.audio.normalized(0.95);

    log::debug!("stage: {:?}", Stage::Tracked);
    let post = post_process(&input.pitch_track)?;

    log::debug!("stage: {:?}", Stage::Classified);
    let labeled: Vec<LabeledFrame> = (0..post.frames.len())
        .filter_map(|i| {
            let f0_hz = post.frames.f0[i];
            let confidence = post.frames.confidence[i];

            if input.no_falsetto {
                return Some(LabeledFrame { f0_hz, is_chest: true });
            }

            let center_sample = post.frames.center_sample(i, input.pitch_track.hop_samples);
            let window = normalized.window_at(center_sample, FEATURE_WINDOW_HALF_SAMPLES);

            let classifier_input = ClassifierInput {
                window,
                sample_rate: normalized.sample_rate,
                f0_hz,
                pre_repair_f0_hz: post.pre_repair_f0[i],
                median_freq: post.median_freq,
                confidence,
            };
            match classify_frame(&classifier_input) {
                RegisterLabel::Chest => Some(LabeledFrame { f0_hz, is_chest: true }),
                RegisterLabel::Falsetto => Some(LabeledFrame { f0_hz, is_chest: false }),
                RegisterLabel::Unknown => None,
            }
        })
        .collect();

    log::debug!("stage: {:?}", Stage::Filtered);
    let registers = filter_registers(&labeled, input.no_falsetto, &post.frames.f0);

    log::debug!("stage: {:?}", Stage::Summarized);
    // C3's cascade guarantees a non-empty frame set by the time classification
    // runs (every earlier empty-set case is a hard error), and C5's step-2
    // fallback guarantees at least the chest list is non-empty in turn, so C6
    // always has something to summarize here; `NoUsableRange` is defensive.
    let summary = summarize(&registers).ok_or(VocalRangeError::NoUsableRange)?;

    let chest_count = registers.chest_hz.len();
    let falsetto_count = registers.falsetto_hz.len();

    Ok(build_output(summary, chest_count, falsetto_count))
}

fn round1(x: f32) -> f32 {
    (x * 10.0).round() / 10.0
}

/// Translate C6's typed summary into the external `AnalysisOutput` contract
/// (spec.md §3: missing register sections are absent).
fn build_output(
    summary: crate::summary::RangeSummary,
    chest_count: usize,
    falsetto_count: usize,
) -> AnalysisOutput {
    let (chest_min, chest_min_hz, chest_max, chest_max_hz, chest_avg_hz) = if chest_count > 0 {
        (
            Some(summary.chest_min_note.clone()),
            Some(round1(summary.chest_min_hz)),
            Some(summary.chest_max_note.clone()),
            Some(round1(summary.chest_max_hz)),
            Some(round1(summary.chest_avg_hz)),
        )
    } else {
        (None, None, None, None, None)
    };

    let (falsetto_min, falsetto_min_hz) = match (&summary.falsetto_min_note, summary.falsetto_min_hz) {
        (Some(note), Some(hz)) if falsetto_count > 0 => (Some(note.clone()), Some(round1(hz))),
        _ => (None, None),
    };
    let (falsetto_max, falsetto_max_hz) = match (&summary.falsetto_max_note, summary.falsetto_max_hz) {
        (Some(note), Some(hz)) if falsetto_count > 0 => (Some(note.clone()), Some(round1(hz))),
        _ => (None, None),
    };

    let total = (chest_count + falsetto_count) as f32;
    let (chest_ratio, falsetto_ratio) = if total > 0.0 {
        let chest_ratio = round1(100.0 * chest_count as f32 / total);
        let falsetto_ratio = if falsetto_count > 0 { Some(round1(100.0 - chest_ratio)) } else { None };
        (Some(chest_ratio), falsetto_ratio)
    } else {
        (None, None)
    };

    AnalysisOutput {
        overall_min: summary.overall_min_note,
        overall_min_hz: round1(summary.overall_min_hz),
        overall_max: summary.overall_max_note,
        overall_max_hz: round1(summary.overall_max_hz),
        chest_min,
        chest_min_hz,
        chest_max,
        chest_max_hz,
        chest_avg_hz,
        chest_count: (chest_count > 0).then_some(chest_count),
        chest_ratio,
        falsetto_min,
        falsetto_min_hz,
        falsetto_max,
        falsetto_max_hz,
        falsetto_count: (falsetto_count > 0).then_some(falsetto_count),
        falsetto_ratio,
    }
}

/// Adapter for callers that want the fatal-error path folded into the same
/// untyped `{error: message}` shape spec.md §3/§6 describes, rather than a
/// `Result`.
pub fn to_result_map(result: VocalRangeResult<AnalysisOutput>) -> Map<String, Value> {
    match result {
        Ok(output) => match serde_json::to_value(output) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        Err(err) => {
            let mut map = Map::new();
            map.insert("error".to_string(), Value::String(err.to_string()));
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch_track::PitchFrame;
    use std::f32::consts::PI;

    fn sine_buffer(freq_hz: f32, sample_rate: u32, seconds: f32) -> AudioBuffer {
        let n = (sample_rate as f32 * seconds) as usize;
        let samples = (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioBuffer::new(samples, sample_rate)
    }

    fn track_of(f0_hz: f32, confidence: f32, count: usize, hop_samples: usize) -> PitchTrack {
        PitchTrack::new(vec![PitchFrame { f0_hz, confidence }; count], hop_samples)
    }

    #[test]
    fn too_short_input_is_fatal() {
        let audio = AudioBuffer::new(vec![0.1; 100], 16_000);
        let pitch_track = track_of(220.0, 0.9, 10, 160);
        let input = AnalysisInput { audio, pitch_track, already_separated: false, no_falsetto: false };
        let err = analyze(&input).unwrap_err();
        assert!(matches!(err, VocalRangeError::TooShort { .. }));
    }

    #[test]
    fn silent_input_is_fatal() {
        let audio = AudioBuffer::new(vec![0.0; 16_000], 16_000);
        let pitch_track = track_of(220.0, 0.9, 10, 160);
        let input = AnalysisInput { audio, pitch_track, already_separated: false, no_falsetto: false };
        let err = analyze(&input).unwrap_err();
        assert!(matches!(err, VocalRangeError::Silent { .. }));
    }

    #[test]
    fn steady_low_tone_is_all_chest() {
        let sample_rate = 16_000;
        let audio = sine_buffer(221.0, sample_rate, 2.0);
        let hop = 160;
        let frame_count = audio.samples.len() / hop;
        let pitch_track = track_of(221.0, 0.9, frame_count, hop);
        let input = AnalysisInput { audio, pitch_track, already_separated: false, no_falsetto: false };
        let result = analyze(&input).unwrap();
        assert_eq!(result.chest_ratio, Some(100.0));
        assert!(result.falsetto_min.is_none());
    }

    #[test]
    fn no_falsetto_mode_suppresses_falsetto_keys() {
        let sample_rate = 16_000;
        let audio = sine_buffer(600.0, sample_rate, 1.0);
        let hop = 160;
        let frame_count = audio.samples.len() / hop;
        let pitch_track = track_of(600.0, 0.9, frame_count, hop);
        let input = AnalysisInput { audio, pitch_track, already_separated: false, no_falsetto: true };
        let result = analyze(&input).unwrap();
        assert!(result.falsetto_min.is_none());
        assert!(result.falsetto_max.is_none());
        assert_eq!(result.chest_ratio, Some(100.0));
    }

    #[test]
    fn error_path_produces_single_key_map() {
        let audio = AudioBuffer::new(vec![0.0; 16_000], 16_000);
        let pitch_track = track_of(220.0, 0.9, 10, 160);
        let input = AnalysisInput { audio, pitch_track, already_separated: false, no_falsetto: false };
        let map = to_result_map(analyze(&input));
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("error"));
    }

    #[test]
    fn success_path_serializes_without_null_register_keys() {
        let sample_rate = 16_000;
        let audio = sine_buffer(221.0, sample_rate, 2.0);
        let hop = 160;
        let frame_count = audio.samples.len() / hop;
        let pitch_track = track_of(221.0, 0.9, frame_count, hop);
        let input = AnalysisInput { audio, pitch_track, already_separated: false, no_falsetto: false };
        let map = to_result_map(analyze(&input));
        assert!(!map.contains_key("falsetto_min"));
        assert!(map.contains_key("chest_ratio"));
    }
}

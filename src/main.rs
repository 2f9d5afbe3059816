//! CLI entry point: analyze a WAV file's sung vocal range and print the
//! result as JSON.
//!
//! Pitch tracking itself is out of scope for the core pipeline (spec.md §3
//! treats the pitch track as supplied by an external estimator); this binary
//! ships a minimal autocorrelation tracker just so the crate is runnable
//! end-to-end from a single audio file.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use vocalrange::pitch_track::{AudioBuffer, PitchFrame, PitchTrack};
use vocalrange::{analyze, to_result_map, AnalysisInput};

const HOP_SAMPLES: usize = 160; // 10ms at 16kHz, the reference hop (spec.md §3)
const FRAME_SAMPLES: usize = 1024;
const MIN_PITCH_HZ: f32 = 60.0;
const MAX_PITCH_HZ: f32 = 1400.0;

struct Args {
    wav_path: PathBuf,
    model_path: Option<PathBuf>,
    no_falsetto: bool,
    already_separated: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut wav_path = None;
    let mut model_path = None;
    let mut no_falsetto = false;
    let mut already_separated = false;

    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--model" => model_path = Some(PathBuf::from(it.next().ok_or("--model needs a path")?)),
            "--no-falsetto" => no_falsetto = true,
            "--already-separated" => already_separated = true,
            other if wav_path.is_none() => wav_path = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    Ok(Args {
        wav_path: wav_path.ok_or("usage: vocalrange <input.wav> [--model <path>] [--no-falsetto] [--already-separated]")?,
        model_path,
        no_falsetto,
        already_separated,
    })
}

fn read_wav_mono(path: &PathBuf) -> Result<AudioBuffer, String> {
    let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let sample_rate = spec.sample_rate;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?
        }
    };

    let mono: Vec<f32> = if channels <= 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioBuffer::new(mono, sample_rate))
}

/// Autocorrelation-based per-frame pitch estimate. Confidence is the
/// normalized autocorrelation peak itself — a crude but monotonic proxy for
/// voicing strength, sufficient to exercise the confidence-gating cascade.
fn track_pitch(audio: &AudioBuffer) -> PitchTrack {
    let sample_rate = audio.sample_rate;
    let min_lag = (sample_rate as f32 / MAX_PITCH_HZ).floor() as usize;
    let max_lag = (sample_rate as f32 / MIN_PITCH_HZ).ceil() as usize;

    let mut frames = Vec::new();
    let mut center = FRAME_SAMPLES / 2;
    while center + FRAME_SAMPLES / 2 <= audio.samples.len() {
        let window = audio.window_at(center, FRAME_SAMPLES / 2);
        frames.push(estimate_frame(window, sample_rate, min_lag, max_lag));
        center += HOP_SAMPLES;
    }

    PitchTrack::new(frames, HOP_SAMPLES)
}

fn estimate_frame(window: &[f32], sample_rate: u32, min_lag: usize, max_lag: usize) -> PitchFrame {
    if window.len() <= max_lag {
        return PitchFrame { f0_hz: -1.0, confidence: 0.0 };
    }
    let zero_lag: f32 = window.iter().map(|&s| s * s).sum();
    if zero_lag < 1e-9 {
        return PitchFrame { f0_hz: -1.0, confidence: 0.0 };
    }

    let mut best_lag = 0usize;
    let mut best_corr = 0.0f32;
    for lag in min_lag..=max_lag.min(window.len() - 1) {
        let corr: f32 = window[..window.len() - lag]
            .iter()
            .zip(window[lag..].iter())
            .map(|(&a, &b)| a * b)
            .sum();
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    if best_lag == 0 {
        return PitchFrame { f0_hz: -1.0, confidence: 0.0 };
    }

    let confidence = (best_corr / zero_lag).clamp(0.0, 1.0);
    PitchFrame { f0_hz: sample_rate as f32 / best_lag as f32, confidence }
}

fn run() -> Result<(), String> {
    env_logger::init();

    let args = parse_args()?;
    if let Some(model_path) = args.model_path {
        vocalrange::model::set_model_path(Some(model_path));
    }

    let audio = read_wav_mono(&args.wav_path)?;
    let pitch_track = track_pitch(&audio);

    let input = AnalysisInput {
        audio,
        pitch_track,
        already_separated: args.already_separated,
        no_falsetto: args.no_falsetto,
    };

    let result = to_result_map(analyze(&input));
    let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

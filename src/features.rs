//! C2 — Feature extractor: per-frame acoustic features for the register classifier.
//!
//! Computes a Hann-windowed, zero-padded 8192-point FFT, locates the first
//! ten harmonic peaks with parabolic interpolation, and derives the six
//! scalars the classifier (C4) consumes.

use std::f32::consts::PI;

use num_complex::Complex;
use once_cell::sync::Lazy;
use rustfft::{Fft, FftPlanner};
use std::sync::Mutex;

use crate::config::*;

/// Six scalar features extracted from a single voiced frame (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub h1_minus_h2_db: f32,
    pub harmonic_count: f32,
    pub harmonic_slope_db_per_n: f32,
    pub hnr_0_1: f32,
    pub centroid_over_f0: f32,
    pub f0_hz: f32,
}

impl FeatureVector {
    /// Flatten to the `[1, 6]` layout the classifier model expects.
    pub fn as_array(&self) -> [f32; 6] {
        [
            self.h1_minus_h2_db,
            self.harmonic_count,
            self.harmonic_slope_db_per_n,
            self.hnr_0_1,
            self.centroid_over_f0,
            self.f0_hz,
        ]
    }
}

/// Global FFT planner, shared across invocations (planning is expensive, the
/// plan itself is immutable and safe to reuse for the fixed `FFT_SIZE`).
#[allow(clippy::non_std_lazy_statics)]
static FFT_PLANNER: Lazy<Mutex<FftPlanner<f32>>> = Lazy::new(|| Mutex::new(FftPlanner::new()));

fn forward_plan() -> std::sync::Arc<dyn Fft<f32>> {
    FFT_PLANNER.lock().expect("fft planner lock").plan_fft_forward(FFT_SIZE)
}

fn hann_window(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    let n_minus_1 = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Magnitude spectrum (bin 0 = DC) of a Hann-windowed, zero-padded `FFT_SIZE` FFT.
fn magnitude_spectrum(frame: &[f32]) -> Vec<f32> {
    let window = hann_window(frame.len());
    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); FFT_SIZE];
    for (i, (&sample, &w)) in frame.iter().zip(window.iter()).enumerate() {
        buffer[i] = Complex::new(sample * w, 0.0);
    }

    let fft = forward_plan();
    fft.process(&mut buffer);

    buffer.iter().map(|c| c.norm()).collect()
}

fn bin_for_freq(freq_hz: f32, sample_rate: u32) -> f32 {
    freq_hz * FFT_SIZE as f32 / sample_rate as f32
}

/// Peak magnitude (dB) within a `±HARMONIC_BAND_FRACTION` band around
/// `target_hz`, refined with parabolic interpolation. Falls back to the raw
/// bin magnitude if the parabola would diverge (spec.md §4.2).
fn get_peak_db(spectrum: &[f32], target_hz: f32, sample_rate: u32) -> f32 {
    let nyquist = sample_rate as f32 / 2.0;
    if target_hz <= 0.0 || target_hz >= nyquist * 0.95 {
        return -120.0;
    }

    let half_win_hz = (target_hz * HARMONIC_BAND_FRACTION).max(10.0);
    let center_bin = bin_for_freq(target_hz, sample_rate);
    let half_win_bins = half_win_hz * FFT_SIZE as f32 / sample_rate as f32;

    let lo = ((center_bin - half_win_bins).floor().max(1.0)) as usize;
    let hi = ((center_bin + half_win_bins).ceil() as usize).min(spectrum.len().saturating_sub(2));
    if lo >= hi {
        return -120.0;
    }

    let (peak_bin, _) = spectrum[lo..=hi]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, m)| (lo + i, *m))
        .unwrap_or((lo, spectrum[lo]));

    let peak_bin = peak_bin.clamp(1, spectrum.len() - 2);
    let (a, b, c) = (spectrum[peak_bin - 1], spectrum[peak_bin], spectrum[peak_bin + 1]);
    let denom = a - 2.0 * b + c;
    let peak_mag = if denom.abs() > 1e-12 {
        let offset = 0.5 * (a - c) / denom;
        let interpolated = b - 0.25 * (a - c) * offset;
        if interpolated > b * 2.0 || interpolated < 0.0 {
            b
        } else {
            interpolated
        }
    } else {
        b
    };

    20.0 * (peak_mag.max(1e-10)).log10()
}

fn percentile(sorted: &[f32], pct: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f32;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Harmonic-to-noise ratio: autocorrelation of the windowed signal, normalized
/// by zero-lag, sampled around the theoretical pitch lag (spec.md §4.2). Only
/// the lags actually needed are computed (zero-lag plus a small window around
/// the expected pitch period), avoiding an O(n^2) full autocorrelation.
fn compute_hnr(frame: &[f32], sample_rate: u32, f0_hz: f32) -> f32 {
    let window = hann_window(frame.len());
    let windowed: Vec<f32> = frame.iter().zip(window.iter()).map(|(&s, &w)| s * w).collect();
    let n = windowed.len() as isize;

    let dot_at_lag = |lag: isize| -> f32 {
        if lag < 0 || lag >= n {
            return 0.0;
        }
        let lag = lag as usize;
        windowed[..n as usize - lag]
            .iter()
            .zip(windowed[lag..].iter())
            .map(|(&a, &b)| a * b)
            .sum()
    };

    let zero_lag = dot_at_lag(0);
    if zero_lag < 1e-10 {
        return HNR_DEFAULT;
    }

    let lag = (sample_rate as f32 / f0_hz).round() as isize;
    if lag < 5 || lag >= n - 5 {
        return HNR_DEFAULT;
    }

    ((lag - HNR_LAG_WINDOW)..=(lag + HNR_LAG_WINDOW))
        .map(|l| dot_at_lag(l) / zero_lag)
        .fold(0.0f32, f32::max)
        .clamp(0.0, 1.0)
}

fn spectral_centroid(spectrum: &[f32], sample_rate: u32) -> f32 {
    let half = spectrum.len() / 2;
    let freq_resolution = sample_rate as f32 / FFT_SIZE as f32;
    let mut weighted_sum = 0.0f64;
    let mut mag_sum = 0.0f64;
    for (bin, &mag) in spectrum.iter().take(half).enumerate() {
        let freq = bin as f32 * freq_resolution;
        weighted_sum += (freq as f64) * (mag as f64);
        mag_sum += mag as f64;
    }
    if mag_sum <= 0.0 {
        0.0
    } else {
        (weighted_sum / mag_sum) as f32
    }
}

/// Extract the six-scalar feature vector for a windowed frame. Returns `None`
/// ("undefined") if the frame is too short, the fundamental is too weak, or
/// no fundamental is detectable at all (spec.md §4.2).
pub fn extract_features(frame: &[f32], sample_rate: u32, f0_hz: f32) -> Option<FeatureVector> {
    if f0_hz <= 0.0 || frame.len() < MIN_FRAME_SAMPLES {
        return None;
    }

    let spectrum = magnitude_spectrum(frame);
    let half = spectrum.len() / 2;

    let mut sorted_for_noise: Vec<f32> = spectrum[..half].to_vec();
    sorted_for_noise.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let noise_floor_db = 20.0 * (percentile(&sorted_for_noise, 5.0).max(1e-12)).log10();

    let harmonics_db: Vec<f32> = (1..=HARMONIC_COUNT as u32)
        .map(|n| get_peak_db(&spectrum, f0_hz * n as f32, sample_rate))
        .collect();

    let h1 = harmonics_db[0];
    if h1 <= H1_FLOOR_DB {
        return None;
    }

    let h1_minus_h2 = h1 - harmonics_db[1];
    if h1_minus_h2 < H1_MINUS_H2_FLOOR_DB {
        return None;
    }

    let harmonic_count = harmonics_db
        .iter()
        .filter(|&&db| db > noise_floor_db + HARMONIC_COUNT_FLOOR_DB_ABOVE_NOISE)
        .count() as f32;

    let slope_points: Vec<(f32, f32)> = harmonics_db
        .iter()
        .enumerate()
        .filter(|(_, &db)| db > noise_floor_db + HARMONIC_COUNT_FLOOR_DB_ABOVE_NOISE)
        .map(|(i, &db)| ((i + 1) as f32, db))
        .collect();

    let harmonic_slope_db_per_n = if slope_points.len() >= HARMONIC_SLOPE_MIN_POINTS {
        linear_fit_slope(&slope_points)
    } else {
        HARMONIC_SLOPE_DEFAULT
    };

    let hnr_0_1 = compute_hnr(frame, sample_rate, f0_hz);
    let centroid = spectral_centroid(&spectrum, sample_rate);
    let centroid_over_f0 = centroid / f0_hz;

    Some(FeatureVector {
        h1_minus_h2_db: h1_minus_h2,
        harmonic_count,
        harmonic_slope_db_per_n,
        hnr_0_1,
        centroid_over_f0,
        f0_hz,
    })
}

/// Ordinary least-squares slope of `y` against `x` (dB per harmonic index).
fn linear_fit_slope(points: &[(f32, f32)]) -> f32 {
    let n = points.len() as f32;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f32>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f32>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for &(x, y) in points {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    if den.abs() < 1e-12 {
        HARMONIC_SLOPE_DEFAULT
    } else {
        num / den
    }
}

/// Synthesize a pure sine tone for tests.
#[cfg(test)]
pub(crate) fn sine_tone(freq_hz: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_tone_yields_features() {
        let sr = 16_000;
        let frame = sine_tone(220.0, sr, 2048);
        let features = extract_features(&frame, sr, 220.0).expect("should extract");
        assert!(features.harmonic_count >= 1.0);
        assert!(features.hnr_0_1 >= 0.0 && features.hnr_0_1 <= 1.0);
    }

    #[test]
    fn too_short_frame_is_none() {
        let sr = 16_000;
        let frame = vec![0.0f32; 100];
        assert!(extract_features(&frame, sr, 220.0).is_none());
    }

    #[test]
    fn zero_f0_is_none() {
        let sr = 16_000;
        let frame = sine_tone(220.0, sr, 2048);
        assert!(extract_features(&frame, sr, 0.0).is_none());
    }

    #[test]
    fn silence_frame_has_weak_fundamental() {
        let sr = 16_000;
        let frame = vec![0.0f32; 2048];
        assert!(extract_features(&frame, sr, 220.0).is_none());
    }
}

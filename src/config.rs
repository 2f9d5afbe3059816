//! Tunable constants for the vocal range pipeline.
//!
//! Collects every threshold spec.md names so tuning touches this file only
//! (mirrors the teacher project's single `config.py` convention).

/// A4 reference frequency used throughout the note table and classifier (Hz).
pub const A4_HZ: f32 = 442.0;

/// Lower/upper bound of the physiologically plausible singing voice range (Hz).
pub const VOICE_MIN_HZ: f32 = 65.0;
pub const VOICE_MAX_HZ: f32 = 1324.0;

/// Minimum kept frames required for the confidence-gating cascade to succeed.
pub const MIN_KEPT_FRAMES: usize = 5;

/// Decreasing confidence thresholds tried in order by the confidence gate (C3 step 1).
pub const CONFIDENCE_THRESHOLDS: [f32; 6] = [0.5, 0.35, 0.2, 0.1, 0.05, 0.01];

/// Confidence floor used to compute the "reference" median for the asymmetric trim.
pub const REFERENCE_CONFIDENCE_FLOOR: f32 = 0.3;

/// Asymmetric unrealistic-range trim bounds, expressed as octaves below/above
/// the reference pitch (C3 step 3).
pub const UNREALISTIC_LOWER_OCTAVES: f32 = 1.5;
pub const UNREALISTIC_UPPER_OCTAVES: f32 = 1.75;

/// Octave-protection rule: a frame this many octaves above the reference,
/// inside voice range, with enough confidence, is never halved (C3 step 4).
pub const OCTAVE_PROTECTION_RATIO: f32 = 1.5;
pub const OCTAVE_PROTECTION_MIN_CONFIDENCE: f32 = 0.5;

/// C4 pre-gate thresholds.
pub const REGISTER_MIN_CONFIDENCE: f32 = 0.35;
pub const CHEST_FLOOR_HZ: f32 = 270.0;

/// Stricter confidence required when a frame's pre-repair pitch sits above
/// `median_freq` by these octave margins (C4 pre-gate).
pub const ABOVE_MEDIAN_FAR_OCTAVES: f32 = 1.5;
pub const ABOVE_MEDIAN_MID_OCTAVES: f32 = 1.0;
pub const ABOVE_MEDIAN_FAR_CONFIDENCE: f32 = 0.65;
pub const ABOVE_MEDIAN_MID_CONFIDENCE: f32 = 0.50;
pub const ABOVE_MEDIAN_NEAR_CONFIDENCE: f32 = 0.35;

/// ML-path posterior acceptance thresholds (C4).
pub const ML_LOW_F0_HZ: f32 = 500.0;
pub const ML_LOW_F0_POSTERIOR: f32 = 0.75;
pub const ML_LOW_CONFIDENCE: f32 = 0.55;
pub const ML_LOW_CONFIDENCE_POSTERIOR: f32 = 0.80;
pub const ML_DEFAULT_POSTERIOR: f32 = 0.70;
pub const ML_CHEST_HIGH_F0_HZ: f32 = 400.0;
pub const ML_CHEST_HIGH_F0_POSTERIOR: f32 = 0.85;

/// Rule-engine falsetto decision threshold (falsetto_score / total).
pub const RULE_FALSETTO_RATIO: f32 = 0.58;

/// Low-falsetto reclassification floor (C5 step 1).
pub const FALSETTO_DISPLAY_MIN_HZ: f32 = 330.0;

/// Outlier percentiles and semitone gaps (C5 step 3), per register mode.
pub const CHEST_OUTLIER_PERCENTILE: f32 = 97.0;
pub const CHEST_OUTLIER_GAP_ST: f32 = 3.0;
pub const FALSETTO_OUTLIER_PERCENTILE: f32 = 75.0;
pub const FALSETTO_OUTLIER_GAP_ST: f32 = 3.0;
pub const NO_FALSETTO_OUTLIER_PERCENTILE: f32 = 95.0;
pub const NO_FALSETTO_OUTLIER_GAP_ST: f32 = 3.0;

/// Isolated-extreme pruning thresholds (C5 step 4).
pub const ISOLATED_EXTREME_RATIO: f32 = 1.5;
pub const ISOLATED_EXTREME_NEIGHBOR_SEMITONES: f32 = 1.0;
pub const ISOLATED_EXTREME_MIN_NEIGHBORS: usize = 4;

/// High-end reconciliation window, in semitones below the top (C5 step 5).
pub const HIGH_END_RECONCILE_SEMITONES: f32 = 2.0;

/// Robust-maximum candidate window (C6).
pub const ROBUST_MAX_NEIGHBOR_SEMITONES: f32 = 1.0;
pub const ROBUST_MAX_MIN_FRAMES: usize = 5;

/// Fatal-error thresholds (§7).
pub const MIN_INPUT_SECONDS: f32 = 0.3;
pub const SILENCE_PEAK_FLOOR: f32 = 0.0001;

/// FFT and harmonic-analysis constants for the feature extractor (C2).
pub const FFT_SIZE: usize = 8192;
pub const MIN_FRAME_SAMPLES: usize = 512;
pub const HARMONIC_COUNT: usize = 10;
pub const HARMONIC_BAND_FRACTION: f32 = 0.035;
pub const H1_FLOOR_DB: f32 = -60.0;
pub const H1_MINUS_H2_FLOOR_DB: f32 = -20.0;
pub const HARMONIC_COUNT_FLOOR_DB_ABOVE_NOISE: f32 = 8.0;
pub const HARMONIC_SLOPE_MIN_POINTS: usize = 3;
pub const HARMONIC_SLOPE_DEFAULT: f32 = -6.0;
pub const HNR_LAG_WINDOW: isize = 3;
pub const HNR_DEFAULT: f32 = 0.5;

/// Bundles every tunable above into a single value so callers can override
/// individual knobs without touching the pipeline's call sites.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub a4_hz: f32,
    pub voice_min_hz: f32,
    pub voice_max_hz: f32,
    pub min_kept_frames: usize,
    pub confidence_thresholds: Vec<f32>,
    pub min_input_seconds: f32,
    pub silence_peak_floor: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            a4_hz: A4_HZ,
            voice_min_hz: VOICE_MIN_HZ,
            voice_max_hz: VOICE_MAX_HZ,
            min_kept_frames: MIN_KEPT_FRAMES,
            confidence_thresholds: CONFIDENCE_THRESHOLDS.to_vec(),
            min_input_seconds: MIN_INPUT_SECONDS,
            silence_peak_floor: SILENCE_PEAK_FLOOR,
        }
    }
}

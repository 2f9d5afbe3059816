//! C4 — Register classifier: per-frame chest/falsetto decision, fusing a
//! learned model (when confident) with a deterministic rule engine.

use crate::config::*;
use crate::features::{extract_features, FeatureVector};
use crate::model::current_model;

/// Per-frame register decision. `Unknown` frames are discarded downstream,
/// never defaulted to a register (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterLabel {
    Chest,
    Falsetto,
    Unknown,
}

/// Everything C4 needs to classify one frame.
pub struct ClassifierInput<'a> {
    pub window: &'a [f32],
    pub sample_rate: u32,
    /// Post-octave-repair pitch, used for scoring (spec.md §9 open question:
    /// pre-repair pitch gates, post-repair pitch scores).
    pub f0_hz: f32,
    /// Pre-octave-repair pitch, used only for the above-median confidence gate.
    pub pre_repair_f0_hz: f32,
    pub median_freq: f32,
    pub confidence: f32,
}

/// One row of the rule-engine scoring table: a named predicate over the
/// feature vector plus the chest/falsetto score deltas it contributes when it
/// fires. Expressed as data (spec.md §9 "scoring engine") rather than
/// hand-coded conditionals so thresholds stay easy to audit and extend.
struct ScoreRule {
    name: &'static str,
    predicate: fn(&FeatureVector, f32) -> bool,
    chest_delta: f32,
    falsetto_delta: f32,
}

fn rule_table() -> &'static [ScoreRule] {
    const RULES: &[ScoreRule] = &[
        ScoreRule { name: "low_confidence_chest_bias", predicate: |_f, conf| conf < ML_LOW_CONFIDENCE, chest_delta: 1.5, falsetto_delta: 0.0 },

        ScoreRule { name: "h1_h2_strong_falsetto", predicate: |f, _| f.h1_minus_h2_db >= 15.0, chest_delta: 0.0, falsetto_delta: 5.0 },
        ScoreRule { name: "h1_h2_mild_falsetto", predicate: |f, _| (5.0..15.0).contains(&f.h1_minus_h2_db), chest_delta: 0.0, falsetto_delta: 3.0 },
        ScoreRule { name: "h1_h2_weak_falsetto", predicate: |f, _| (0.0..5.0).contains(&f.h1_minus_h2_db), chest_delta: 0.0, falsetto_delta: 1.0 },
        ScoreRule { name: "h1_h2_mild_chest", predicate: |f, _| (-10.0..0.0).contains(&f.h1_minus_h2_db), chest_delta: 2.0, falsetto_delta: 0.0 },
        ScoreRule { name: "h1_h2_strong_chest", predicate: |f, _| f.h1_minus_h2_db < -10.0, chest_delta: 4.0, falsetto_delta: 0.0 },

        ScoreRule { name: "hcount_very_low_falsetto", predicate: |f, _| f.harmonic_count <= 2.0, chest_delta: 0.0, falsetto_delta: 6.0 },
        ScoreRule { name: "hcount_very_high_chest", predicate: |f, _| f.harmonic_count >= 8.0, chest_delta: 6.0, falsetto_delta: 0.0 },
        ScoreRule { name: "hcount_mid_falsetto", predicate: |f, _| f.harmonic_count > 2.0 && f.harmonic_count < 5.0, chest_delta: 0.0, falsetto_delta: 2.0 },
        ScoreRule { name: "hcount_mid_chest", predicate: |f, _| (5.0..8.0).contains(&f.harmonic_count), chest_delta: 2.0, falsetto_delta: 0.0 },

        ScoreRule { name: "slope_steep_falsetto", predicate: |f, _| f.harmonic_slope_db_per_n < -9.0, chest_delta: 0.0, falsetto_delta: 3.0 },
        ScoreRule { name: "slope_mid_falsetto", predicate: |f, _| (-9.0..-6.0).contains(&f.harmonic_slope_db_per_n), chest_delta: 0.0, falsetto_delta: 1.0 },
        ScoreRule { name: "slope_gentle_chest", predicate: |f, _| f.harmonic_slope_db_per_n >= -3.0, chest_delta: 2.0, falsetto_delta: 0.0 },

        ScoreRule { name: "hnr_low_falsetto", predicate: |f, _| f.hnr_0_1 < 0.3, chest_delta: 0.0, falsetto_delta: 3.0 },
        ScoreRule { name: "hnr_mid_falsetto", predicate: |f, _| (0.3..0.5).contains(&f.hnr_0_1), chest_delta: 0.0, falsetto_delta: 1.0 },
        ScoreRule { name: "hnr_high_chest", predicate: |f, _| f.hnr_0_1 >= 0.7, chest_delta: 3.0, falsetto_delta: 0.0 },

        ScoreRule { name: "centroid_low_falsetto", predicate: |f, _| f.centroid_over_f0 < 2.0, chest_delta: 0.0, falsetto_delta: 3.0 },
        ScoreRule { name: "centroid_mid_falsetto", predicate: |f, _| (2.0..3.0).contains(&f.centroid_over_f0), chest_delta: 0.0, falsetto_delta: 1.0 },
        ScoreRule { name: "centroid_high_chest", predicate: |f, _| f.centroid_over_f0 >= 4.0, chest_delta: 3.0, falsetto_delta: 0.0 },

        ScoreRule { name: "f0_above_600_falsetto", predicate: |f, _| f.f0_hz > 600.0, chest_delta: 0.0, falsetto_delta: 1.0 },
        ScoreRule { name: "f0_above_500_falsetto", predicate: |f, _| f.f0_hz > 500.0 && f.f0_hz <= 600.0, chest_delta: 0.0, falsetto_delta: 0.5 },
        ScoreRule { name: "f0_below_220_chest", predicate: |f, _| f.f0_hz < 220.0, chest_delta: 3.0, falsetto_delta: 0.0 },
        ScoreRule { name: "f0_below_295_chest", predicate: |f, _| f.f0_hz >= 220.0 && f.f0_hz < 295.0, chest_delta: 1.5, falsetto_delta: 0.0 },
        ScoreRule { name: "f0_below_350_chest", predicate: |f, _| f.f0_hz >= 295.0 && f.f0_hz < 350.0, chest_delta: 0.5, falsetto_delta: 0.0 },
    ];
    RULES
}

/// Deterministic rule path (spec.md §4.4 "Rule path"): accumulate
/// chest/falsetto scores from the table above, decide by ratio.
fn classify_by_rules(features: &FeatureVector, confidence: f32) -> RegisterLabel {
    let mut chest_score = 0.0f32;
    let mut falsetto_score = 0.0f32;

    for rule in rule_table() {
        if (rule.predicate)(features, confidence) {
            chest_score += rule.chest_delta;
            falsetto_score += rule.falsetto_delta;
            log::trace!(
                "rule fired: {} chest+={} falsetto+={}",
                rule.name, rule.chest_delta, rule.falsetto_delta
            );
        }
    }

    let total = chest_score + falsetto_score;
    if total <= 0.0 {
        return RegisterLabel::Chest;
    }
    if falsetto_score / total >= RULE_FALSETTO_RATIO {
        RegisterLabel::Falsetto
    } else {
        RegisterLabel::Chest
    }
}

/// ML-path acceptance gate (spec.md §4.4 "ML path"): given the predicted
/// label/posterior and the frame context, decide whether to trust the model.
fn ml_accepts(predicted: RegisterLabel, posterior: f32, f0_hz: f32, confidence: f32) -> bool {
    let required = if f0_hz < ML_LOW_F0_HZ {
        ML_LOW_F0_POSTERIOR
    } else if confidence < ML_LOW_CONFIDENCE {
        ML_LOW_CONFIDENCE_POSTERIOR
    } else {
        ML_DEFAULT_POSTERIOR
    };
    if posterior < required {
        return false;
    }
    if predicted == RegisterLabel::Chest && f0_hz >= ML_CHEST_HIGH_F0_HZ && posterior < ML_CHEST_HIGH_F0_POSTERIOR {
        return false;
    }
    true
}

/// Above-median confidence pre-gate (spec.md §4.4): stricter confidence is
/// required the further `pre_repair_f0_hz` sits above `median_freq`, gated on
/// the *pre*-octave-repair pitch (spec.md §9 open question, resolved: gate on
/// pre-repair, score on post-repair).
fn above_median_ok(pre_repair_f0_hz: f32, median_freq: f32, confidence: f32) -> bool {
    if median_freq <= 0.0 || pre_repair_f0_hz <= median_freq {
        return true;
    }
    let octaves_above = (pre_repair_f0_hz / median_freq).log2();
    let required = if octaves_above > ABOVE_MEDIAN_FAR_OCTAVES {
        ABOVE_MEDIAN_FAR_CONFIDENCE
    } else if octaves_above > ABOVE_MEDIAN_MID_OCTAVES {
        ABOVE_MEDIAN_MID_CONFIDENCE
    } else {
        ABOVE_MEDIAN_NEAR_CONFIDENCE
    };
    confidence >= required
}

/// Classify one frame, fusing the ML path (if a model is loaded and features
/// extract cleanly) with the rule engine as fallback.
pub fn classify_frame(input: &ClassifierInput) -> RegisterLabel {
    if input.confidence < REGISTER_MIN_CONFIDENCE {
        return RegisterLabel::Unknown;
    }
    if input.f0_hz < CHEST_FLOOR_HZ {
        return RegisterLabel::Chest;
    }
    if !above_median_ok(input.pre_repair_f0_hz, input.median_freq, input.confidence) {
        return RegisterLabel::Unknown;
    }

    let features = extract_features(input.window, input.sample_rate, input.f0_hz);

    if let Some(features) = &features {
        if let Some(model) = current_model() {
            match model.predict_proba(features) {
                Ok((p_chest, p_falsetto)) => {
                    let (predicted, posterior) = if p_falsetto >= p_chest {
                        (RegisterLabel::Falsetto, p_falsetto)
                    } else {
                        (RegisterLabel::Chest, p_chest)
                    };
                    if ml_accepts(predicted, posterior, input.f0_hz, input.confidence) {
                        return predicted;
                    }
                }
                Err(err) => {
                    log::debug!("classifier inference failed, falling back to rules: {err}");
                }
            }
        }
    }

    match features {
        Some(features) => classify_by_rules(&features, input.confidence),
        None => RegisterLabel::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::sine_tone;

    #[test]
    fn low_confidence_is_unknown() {
        let window = sine_tone(220.0, 16_000, 2048);
        let input = ClassifierInput {
            window: &window,
            sample_rate: 16_000,
            f0_hz: 220.0,
            pre_repair_f0_hz: 220.0,
            median_freq: 220.0,
            confidence: 0.1,
        };
        assert_eq!(classify_frame(&input), RegisterLabel::Unknown);
    }

    #[test]
    fn below_chest_floor_is_chest() {
        let window = sine_tone(200.0, 16_000, 2048);
        let input = ClassifierInput {
            window: &window,
            sample_rate: 16_000,
            f0_hz: 200.0,
            pre_repair_f0_hz: 200.0,
            median_freq: 220.0,
            confidence: 0.9,
        };
        assert_eq!(classify_frame(&input), RegisterLabel::Chest);
    }

    #[test]
    fn far_above_median_needs_high_confidence() {
        assert!(!above_median_ok(2000.0, 220.0, 0.5));
        assert!(above_median_ok(2000.0, 220.0, 0.9));
    }

    #[test]
    fn steady_low_tone_classifies_chest_by_rules() {
        let sample_rate = 16_000;
        let window = sine_tone(220.0, sample_rate, 4096);
        let input = ClassifierInput {
            window: &window,
            sample_rate,
            f0_hz: 220.0,
            pre_repair_f0_hz: 220.0,
            median_freq: 220.0,
            confidence: 0.9,
        };
        assert_eq!(classify_frame(&input), RegisterLabel::Chest);
    }
}

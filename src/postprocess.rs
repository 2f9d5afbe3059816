//! C3 — Pitch post-processor: confidence gate, voice-range gate, asymmetric
//! unrealistic-range trim, octave repair, and confidence-weighted median.
//!
//! Each step preserves the mapping back to original frame indices (spec.md §9).

use crate::config::*;
use crate::error::VocalRangeError;
use crate::pitch_track::{FrameSet, PitchTrack};

/// Output of C3: the filtered, octave-repaired frame set plus the
/// confidence-weighted median frequency used downstream by C4.
#[derive(Debug, Clone)]
pub struct PostProcessed {
    pub frames: FrameSet,
    /// `f0` as reported before octave repair, aligned with `frames` (C4 needs
    /// both the pre- and post-repair pitch for different decisions, §4.4/§9).
    pub pre_repair_f0: Vec<f32>,
    pub median_freq: f32,
}

fn median(sorted: &[f32]) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Confidence gating (C3 step 1): try decreasing thresholds, accept the first
/// that yields >= `MIN_KEPT_FRAMES` frames.
fn confidence_gate(track: &PitchTrack) -> Result<FrameSet, VocalRangeError> {
    let base = FrameSet::from_track(track);
    for &threshold in CONFIDENCE_THRESHOLDS.iter() {
        let kept = base.filter(|f0, conf| f0 > 0.0 && conf >= threshold);
        if kept.len() >= MIN_KEPT_FRAMES {
            log::debug!("confidence gate: threshold={threshold} kept={}", kept.len());
            return Ok(kept);
        }
    }
    Err(VocalRangeError::TrackerFailed { min_frames: MIN_KEPT_FRAMES })
}

/// Voice-range gate (C3 step 2): keep frames within `[VOICE_MIN_HZ, VOICE_MAX_HZ]`.
fn voice_range_gate(frames: &FrameSet) -> Result<FrameSet, VocalRangeError> {
    let kept = frames.filter(|f0, _| f0 >= VOICE_MIN_HZ && f0 <= VOICE_MAX_HZ);
    if kept.is_empty() {
        return Err(VocalRangeError::OutOfVoiceRange { min_hz: VOICE_MIN_HZ, max_hz: VOICE_MAX_HZ });
    }
    Ok(kept)
}

/// Reference pitch used by the trim and octave-repair steps: median of
/// frames at/above `REFERENCE_CONFIDENCE_FLOOR`, or the overall median if too few.
fn reference_pitch(frames: &FrameSet) -> f32 {
    let mut confident: Vec<f32> = frames
        .f0
        .iter()
        .zip(frames.confidence.iter())
        .filter(|(_, &c)| c >= REFERENCE_CONFIDENCE_FLOOR)
        .map(|(&f0, _)| f0)
        .collect();

    if confident.len() >= MIN_KEPT_FRAMES {
        confident.sort_by(|a, b| a.partial_cmp(b).unwrap());
        median(&confident)
    } else {
        let mut all = frames.f0.clone();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        median(&all)
    }
}

/// Asymmetric unrealistic-range trim (C3 step 3): keep
/// `reference / 2^1.5 <= f0 <= reference * 2^1.75`.
fn unrealistic_range_trim(frames: &FrameSet, reference: f32) -> Result<FrameSet, VocalRangeError> {
    let lower = reference / 2f32.powf(UNREALISTIC_LOWER_OCTAVES);
    let upper = reference * 2f32.powf(UNREALISTIC_UPPER_OCTAVES);
    let kept = frames.filter(|f0, _| f0 >= lower && f0 <= upper);
    if kept.is_empty() {
        return Err(VocalRangeError::NoUsableRange);
    }
    Ok(kept)
}

/// Octave repair (C3 step 4): for each frame, consider halving/doubling; pick
/// whichever alternative is in-range and strictly closer to `reference` than
/// both the original and the other alternative. Frames that represent a
/// legitimate high jump (in voice range, far above reference, confident) are
/// protected from correction.
fn octave_repair(frames: &FrameSet, reference: f32) -> FrameSet {
    let mut repaired = frames.clone();
    for i in 0..repaired.len() {
        let f0 = repaired.f0[i];
        let conf = repaired.confidence[i];

        let protected = f0 > OCTAVE_PROTECTION_RATIO * reference
            && f0 >= VOICE_MIN_HZ
            && f0 <= VOICE_MAX_HZ
            && conf >= OCTAVE_PROTECTION_MIN_CONFIDENCE;
        if protected {
            continue;
        }

        let doubled = f0 * 2.0;
        let halved = f0 / 2.0;
        let doubled_ok = doubled >= VOICE_MIN_HZ && doubled <= VOICE_MAX_HZ;
        let halved_ok = halved >= VOICE_MIN_HZ && halved <= VOICE_MAX_HZ;

        let dist = |x: f32| (x - reference).abs();
        let mut best = f0;
        let mut best_dist = dist(f0);

        if doubled_ok && dist(doubled) < best_dist && (!halved_ok || dist(doubled) < dist(halved)) {
            best = doubled;
            best_dist = dist(doubled);
        }
        if halved_ok && dist(halved) < best_dist && (!doubled_ok || dist(halved) < dist(doubled)) {
            best = halved;
        }

        repaired.f0[i] = best;
    }
    repaired
}

/// Confidence-weighted median (C3 step 5): sort kept `f0` ascending, walk the
/// cumulative confidence, return the `f0` at the half-total crossing point.
fn confidence_weighted_median(frames: &FrameSet) -> f32 {
    if frames.is_empty() {
        return 0.0;
    }
    let mut pairs: Vec<(f32, f32)> = frames
        .f0
        .iter()
        .zip(frames.confidence.iter())
        .map(|(&f0, &c)| (f0, c))
        .collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let total: f32 = pairs.iter().map(|(_, c)| c).sum();
    if total <= 0.0 {
        return median(&pairs.iter().map(|(f0, _)| *f0).collect::<Vec<_>>());
    }

    let half = total / 2.0;
    let mut cumulative = 0.0;
    for (f0, conf) in &pairs {
        cumulative += conf;
        if cumulative >= half {
            return *f0;
        }
    }
    pairs.last().unwrap().0
}

/// Run the full C3 cascade over a raw pitch track.
pub fn post_process(track: &PitchTrack) -> Result<PostProcessed, VocalRangeError> {
    let gated = confidence_gate(track)?;
    let in_range = voice_range_gate(&gated)?;

    let reference = reference_pitch(&in_range);
    let trimmed = unrealistic_range_trim(&in_range, reference)?;

    let pre_repair_f0 = trimmed.f0.clone();
    let repaired = octave_repair(&trimmed, reference);

    let median_freq = confidence_weighted_median(&repaired);
    log::debug!(
        "post_process: kept={} reference={reference:.1} median_freq={median_freq:.1}",
        repaired.len()
    );

    Ok(PostProcessed { frames: repaired, pre_repair_f0, median_freq })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch_track::PitchFrame;

    fn track_of(f0s: &[f32], conf: f32) -> PitchTrack {
        PitchTrack::new(
            f0s.iter().map(|&f0| PitchFrame { f0_hz: f0, confidence: conf }).collect(),
            160,
        )
    }

    #[test]
    fn exactly_five_frames_at_lowest_threshold_succeeds() {
        let track = track_of(&[220.0; 5], 0.02);
        assert!(post_process(&track).is_ok());
    }

    #[test]
    fn exactly_four_frames_fails_tracker() {
        let track = track_of(&[220.0; 4], 0.02);
        let err = post_process(&track).unwrap_err();
        assert_eq!(err, VocalRangeError::TrackerFailed { min_frames: MIN_KEPT_FRAMES });
    }

    #[test]
    fn voice_range_boundary() {
        let mut frames = vec![PitchFrame { f0_hz: 65.0, confidence: 0.9 }; 5];
        frames.push(PitchFrame { f0_hz: 64.9, confidence: 0.9 });
        let track = PitchTrack::new(frames, 160);
        let result = post_process(&track).unwrap();
        // 64.9 Hz must have been dropped by the voice-range gate.
        assert!(result.frames.f0.iter().all(|&f0| f0 >= 65.0));
    }

    #[test]
    fn octave_protection_respects_confidence() {
        let mut f0s = vec![220.0; 10];
        f0s.push(220.0 * 1.6);
        let mut confs = vec![0.9; 10];
        confs.push(0.5);
        let frames: Vec<PitchFrame> = f0s
            .iter()
            .zip(confs.iter())
            .map(|(&f0, &c)| PitchFrame { f0_hz: f0, confidence: c })
            .collect();
        let track = PitchTrack::new(frames, 160);
        let result = post_process(&track).unwrap();
        let high_frame = *result.frames.f0.last().unwrap();
        // confidence 0.5 is protected: frame must not have been halved.
        assert!((high_frame - 220.0 * 1.6).abs() < 1.0);
    }

    #[test]
    fn low_confidence_high_frame_is_corrected() {
        let mut f0s = vec![220.0; 10];
        f0s.push(220.0 * 1.6);
        let mut confs = vec![0.9; 10];
        confs.push(0.49);
        let frames: Vec<PitchFrame> = f0s
            .iter()
            .zip(confs.iter())
            .map(|(&f0, &c)| PitchFrame { f0_hz: f0, confidence: c })
            .collect();
        let track = PitchTrack::new(frames, 160);
        let result = post_process(&track).unwrap();
        let high_frame = *result.frames.f0.last().unwrap();
        // Below protection confidence: eligible for octave repair toward reference.
        assert!(high_frame < 220.0 * 1.6);
    }

    #[test]
    fn subharmonic_frames_are_doubled_toward_true_fundamental() {
        // Mirrors spec.md §8 scenario S4: a true 440 Hz tone with 20% of
        // frames reporting the sub-harmonic 220 Hz at low confidence.
        let mut f0s = vec![440.0; 40];
        for i in 0..8 {
            f0s[i] = 220.0;
        }
        let confs: Vec<f32> = (0..40).map(|i| if i < 8 { 0.4 } else { 0.9 }).collect();
        let frames: Vec<PitchFrame> = f0s
            .iter()
            .zip(confs.iter())
            .map(|(&f0, &c)| PitchFrame { f0_hz: f0, confidence: c })
            .collect();
        let track = PitchTrack::new(frames, 160);
        let result = post_process(&track).unwrap();
        assert!(result.frames.f0.iter().all(|&f0| (f0 - 440.0).abs() < 5.0));
    }
}

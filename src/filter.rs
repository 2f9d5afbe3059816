//! C5 — Outlier and cohesion filter: cleans up the per-frame chest/falsetto
//! labels into two frequency lists suitable for range summarization.

use crate::config::*;

/// One classified, voiced frame surviving C4.
#[derive(Debug, Clone, Copy)]
pub struct LabeledFrame {
    pub f0_hz: f32,
    pub is_chest: bool,
}

/// Output of C5: separate chest and falsetto frequency lists, each sorted ascending.
#[derive(Debug, Clone, Default)]
pub struct FilteredRegisters {
    pub chest_hz: Vec<f32>,
    pub falsetto_hz: Vec<f32>,
}

fn semitone_gap(a: f32, b: f32) -> f32 {
    12.0 * (a.max(b) / a.min(b).max(1e-6)).log2()
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

/// Statistical outlier trim (C5 step 3): compute `P{percentile_cut}` as the
/// reference, keep only values `<= reference * 2^(gap_semitones/12)`. Reverts
/// to the untrimmed input if the trim would empty the list.
fn trim_statistical_outliers(sorted: &[f32], percentile_cut: f32, gap_semitones: f32) -> Vec<f32> {
    if sorted.is_empty() {
        return Vec::new();
    }
    let reference = percentile(sorted, percentile_cut);
    let cutoff = reference * 2f32.powf(gap_semitones / 12.0);
    let trimmed: Vec<f32> = sorted.iter().copied().filter(|&f0| f0 <= cutoff).collect();
    if trimmed.is_empty() {
        sorted.to_vec()
    } else {
        trimmed
    }
}

/// Isolated-extreme pruning (C5 step 4): for every value above
/// `ISOLATED_EXTREME_RATIO`x the list's median, count its neighbors within
/// `ISOLATED_EXTREME_NEIGHBOR_SEMITONES`; drop it if that count is below
/// `ISOLATED_EXTREME_MIN_NEIGHBORS`. Never drops everything.
fn prune_isolated_extremes(sorted: &[f32]) -> Vec<f32> {
    if sorted.is_empty() {
        return Vec::new();
    }
    let threshold = ISOLATED_EXTREME_RATIO * median(sorted);
    let keep: Vec<bool> = sorted
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if v <= threshold {
                return true;
            }
            let neighbors = sorted
                .iter()
                .enumerate()
                .filter(|&(j, &other)| j != i && semitone_gap(v, other) <= ISOLATED_EXTREME_NEIGHBOR_SEMITONES)
                .count();
            neighbors >= ISOLATED_EXTREME_MIN_NEIGHBORS
        })
        .collect();

    let out: Vec<f32> = sorted
        .iter()
        .zip(keep.iter())
        .filter(|&(_, &k)| k)
        .map(|(&v, _)| v)
        .collect();
    if out.is_empty() {
        sorted.to_vec()
    } else {
        out
    }
}

/// Quantize a frequency to the nearest semitone bucket for top-label comparison.
fn semitone_bucket(f0: f32) -> i32 {
    (12.0 * (f0 / A4_HZ).log2()).round() as i32
}

/// High-end reconciliation (C5 step 5): within `HIGH_END_RECONCILE_SEMITONES`
/// of the overall max, if both registers have a representative in that zone,
/// drop the chest ones there. Afterward, drop any chest value quantizing to
/// falsetto's top semitone bucket.
fn reconcile_high_end(chest: &mut Vec<f32>, falsetto: &[f32]) {
    if falsetto.is_empty() || chest.is_empty() {
        return;
    }
    let overall_max = chest
        .iter()
        .chain(falsetto.iter())
        .cloned()
        .fold(f32::MIN, f32::max);

    let in_zone = |f0: f32| semitone_gap(f0, overall_max) <= HIGH_END_RECONCILE_SEMITONES;
    let chest_in_zone = chest.iter().any(|&f0| in_zone(f0));
    let falsetto_in_zone = falsetto.iter().any(|&f0| in_zone(f0));
    if chest_in_zone && falsetto_in_zone {
        chest.retain(|&f0| !in_zone(f0));
    }

    if let Some(&falsetto_top) = falsetto.last() {
        let top_bucket = semitone_bucket(falsetto_top);
        chest.retain(|&f0| semitone_bucket(f0) != top_bucket);
    }
}

/// Run the full C5 cascade over classified frames. `no_falsetto_mode` reflects
/// the caller's explicit `no_falsetto` input flag (spec.md §6), which selects
/// the chest outlier percentile/gap — it is a pipeline-wide mode, not merely
/// "the falsetto list happened to end up empty." `all_post_c3_f0` is every
/// frame's pitch after C3 (before C4's per-frame classification dropped any
/// as `unknown`); it is only consulted by the step-2 fallback below.
pub fn filter_registers(frames: &[LabeledFrame], no_falsetto_mode: bool, all_post_c3_f0: &[f32]) -> FilteredRegisters {
    let mut chest: Vec<f32> = frames
        .iter()
        .filter(|f| f.is_chest)
        .map(|f| f.f0_hz)
        .collect();
    let mut falsetto: Vec<f32> = frames
        .iter()
        .filter(|f| !f.is_chest)
        .map(|f| f.f0_hz)
        .collect();

    // Low-falsetto reclassification (step 1): falsetto labels below the
    // display floor are implausible and are folded back into chest.
    let mut reclassified = Vec::new();
    falsetto.retain(|&f0| {
        if f0 < FALSETTO_DISPLAY_MIN_HZ {
            reclassified.push(f0);
            false
        } else {
            true
        }
    });
    chest.extend(reclassified);

    chest.sort_by(|a, b| a.partial_cmp(b).unwrap());
    falsetto.sort_by(|a, b| a.partial_cmp(b).unwrap());

    // Empty-result fallback (step 2): if C4 left nothing in either register
    // (e.g. every frame was gated to `unknown`), treat every post-C3 frame as
    // chest rather than reporting an empty result.
    if chest.is_empty() && falsetto.is_empty() {
        chest = all_post_c3_f0.to_vec();
        chest.sort_by(|a, b| a.partial_cmp(b).unwrap());
        if chest.is_empty() {
            return FilteredRegisters::default();
        }
    }

    let (chest_pct, chest_gap) = if no_falsetto_mode {
        (NO_FALSETTO_OUTLIER_PERCENTILE, NO_FALSETTO_OUTLIER_GAP_ST)
    } else {
        (CHEST_OUTLIER_PERCENTILE, CHEST_OUTLIER_GAP_ST)
    };
    let (falsetto_pct, falsetto_gap) = (FALSETTO_OUTLIER_PERCENTILE, FALSETTO_OUTLIER_GAP_ST);

    let chest = trim_statistical_outliers(&chest, chest_pct, chest_gap);
    let falsetto = trim_statistical_outliers(&falsetto, falsetto_pct, falsetto_gap);

    let mut chest = prune_isolated_extremes(&chest);
    let falsetto = prune_isolated_extremes(&falsetto);

    reconcile_high_end(&mut chest, &falsetto);

    log::debug!(
        "filter_registers: chest={} falsetto={}",
        chest.len(),
        falsetto.len()
    );

    FilteredRegisters { chest_hz: chest, falsetto_hz: falsetto }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(f0: f32, chest: bool) -> LabeledFrame {
        LabeledFrame { f0_hz: f0, is_chest: chest }
    }

    #[test]
    fn low_falsetto_is_reclassified_as_chest() {
        let frames = vec![frame(220.0, true), frame(250.0, false), frame(300.0, true)];
        let out = filter_registers(&frames, false, &[]);
        assert!(out.falsetto_hz.is_empty());
        assert!(out.chest_hz.contains(&250.0));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let out = filter_registers(&[], false, &[]);
        assert!(out.chest_hz.is_empty());
        assert!(out.falsetto_hz.is_empty());
    }

    #[test]
    fn isolated_spike_is_pruned() {
        let mut frames: Vec<LabeledFrame> = (0..10).map(|_| frame(220.0, true)).collect();
        frames.push(frame(220.0 * 4.0, true));
        let out = filter_registers(&frames, false, &[]);
        assert!(!out.chest_hz.contains(&(220.0 * 4.0)));
    }

    #[test]
    fn high_end_reconciliation_prefers_falsetto_at_top() {
        let mut frames: Vec<LabeledFrame> = (0..10).map(|_| frame(300.0, true)).collect();
        frames.extend((0..10).map(|_| frame(600.0, false)));
        frames.push(frame(605.0, true));
        let out = filter_registers(&frames, false, &[]);
        assert!(!out.chest_hz.iter().any(|&f0| semitone_gap(f0, 605.0) < 0.5));
    }

    #[test]
    fn never_drops_everything() {
        let frames = vec![frame(440.0, true)];
        let out = filter_registers(&frames, false, &[]);
        assert_eq!(out.chest_hz.len(), 1);
    }

    #[test]
    fn all_unknown_falls_back_to_post_c3_frames_as_chest() {
        // Every frame was gated to `unknown` by C4; C5 must not report an
        // empty result — it treats the pre-C4 pitches as chest (spec step 2).
        let out = filter_registers(&[], false, &[210.0, 215.0, 220.0]);
        assert_eq!(out.chest_hz.len(), 3);
        assert!(out.falsetto_hz.is_empty());
    }
}

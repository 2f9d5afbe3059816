//! C6 — Range summarizer: turns filtered chest/falsetto frequency lists into
//! the user-facing range summary (lowest/highest notes, ratios).

use crate::filter::FilteredRegisters;
use crate::note_table::hz_to_label;

/// Final range summary, ready for the external `Result` map (C7).
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSummary {
    pub chest_min_hz: f32,
    pub chest_max_hz: f32,
    pub chest_min_note: String,
    pub chest_max_note: String,
    pub chest_avg_hz: f32,

    pub falsetto_min_hz: Option<f32>,
    pub falsetto_max_hz: Option<f32>,
    pub falsetto_min_note: Option<String>,
    pub falsetto_max_note: Option<String>,

    pub overall_min_hz: f32,
    pub overall_max_hz: f32,
    pub overall_min_note: String,
    pub overall_max_note: String,
}

fn semitone_gap(a: f32, b: f32) -> f32 {
    12.0 * (a.max(b) / a.min(b).max(1e-6)).log2()
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Robust maximum (spec.md §4.6): walk from the top down, take the first
/// candidate with at least `ROBUST_MAX_MIN_FRAMES` values (including itself)
/// within `ROBUST_MAX_NEIGHBOR_SEMITONES` of it. Falls back to the literal max
/// if no such cluster exists.
fn robust_max(sorted: &[f32]) -> f32 {
    use crate::config::{ROBUST_MAX_MIN_FRAMES, ROBUST_MAX_NEIGHBOR_SEMITONES};
    if sorted.is_empty() {
        return 0.0;
    }
    for i in (0..sorted.len()).rev() {
        let candidate = sorted[i];
        let neighbor_count = sorted
            .iter()
            .filter(|&&v| semitone_gap(v, candidate) <= ROBUST_MAX_NEIGHBOR_SEMITONES)
            .count();
        if neighbor_count >= ROBUST_MAX_MIN_FRAMES {
            return candidate;
        }
    }
    *sorted.last().unwrap()
}

/// Summarize the filtered register lists (each assumed already sorted ascending).
pub fn summarize(registers: &FilteredRegisters) -> Option<RangeSummary> {
    if registers.chest_hz.is_empty() && registers.falsetto_hz.is_empty() {
        return None;
    }

    let chest_min_hz = registers.chest_hz.first().copied().unwrap_or(0.0);
    let chest_max_hz = if registers.chest_hz.is_empty() {
        0.0
    } else {
        robust_max(&registers.chest_hz)
    };
    let chest_avg_hz = mean(&registers.chest_hz);

    let falsetto_min_hz = registers.falsetto_hz.first().copied();
    let falsetto_max_hz = if registers.falsetto_hz.is_empty() {
        None
    } else {
        Some(robust_max(&registers.falsetto_hz))
    };

    let mut union: Vec<f32> = registers
        .chest_hz
        .iter()
        .chain(registers.falsetto_hz.iter())
        .copied()
        .collect();
    union.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let overall_min_hz = *union.first().unwrap();
    let overall_max_hz = robust_max(&union);

    Some(RangeSummary {
        chest_min_hz,
        chest_max_hz,
        chest_min_note: hz_to_label(chest_min_hz).0,
        chest_max_note: hz_to_label(chest_max_hz).0,
        chest_avg_hz,
        falsetto_min_hz,
        falsetto_max_hz,
        falsetto_min_note: falsetto_min_hz.map(|hz| hz_to_label(hz).0),
        falsetto_max_note: falsetto_max_hz.map(|hz| hz_to_label(hz).0),
        overall_min_hz,
        overall_max_hz,
        overall_min_note: hz_to_label(overall_min_hz).0,
        overall_max_note: hz_to_label(overall_max_hz).0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_input_summarizes_to_none() {
        assert!(summarize(&FilteredRegisters::default()).is_none());
    }

    #[test]
    fn chest_only_summary() {
        let registers = FilteredRegisters {
            chest_hz: vec![220.0, 230.0, 440.0, 442.0, 445.0, 446.0],
            falsetto_hz: vec![],
        };
        let summary = summarize(&registers).unwrap();
        assert_eq!(summary.chest_min_hz, 220.0);
        assert!(summary.falsetto_min_hz.is_none());
        assert!(summary.overall_max_hz >= 440.0);
    }

    #[test]
    fn robust_max_skips_single_isolated_spike() {
        let mut values: Vec<f32> = vec![200.0; 6];
        values.push(800.0);
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((robust_max(&values) - 200.0).abs() < 1.0);
    }

    #[test]
    fn chest_avg_is_arithmetic_mean() {
        let registers = FilteredRegisters {
            chest_hz: vec![100.0, 100.0, 100.0, 100.0, 100.0, 700.0],
            falsetto_hz: vec![],
        };
        let summary = summarize(&registers).unwrap();
        assert_relative_eq!(summary.chest_avg_hz, 200.0, epsilon = 1e-3);
    }
}

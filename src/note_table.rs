//! C1 — Note codec: bidirectional mapping between Hz and localized note labels.
//!
//! The table is frozen at process start, sorted by frequency, and looked up
//! by nearest neighbor in log-frequency space (linear-Hz nearest neighbor
//! would bias matches toward low notes). Octave boundaries run A-to-G#, not
//! C-to-B: band `i` (0-indexed `lowlow..hihihi`) spans `A{i}..G#{i+1}`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::config::A4_HZ;

/// Chromatic note names in A-anchored order, matching the localized label suffix.
const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Octave-band prefixes, in ascending order (band `i` starts at scientific octave `i`).
const OCTAVE_PREFIXES: [&str; 7] = ["lowlow", "low", "mid1", "mid2", "hi", "hihi", "hihihi"];

/// One entry in the frozen note table: a localized label and its reference Hz.
#[derive(Debug, Clone, PartialEq)]
struct NoteEntry {
    label: String,
    hz: f32,
}

/// Frozen, sorted-by-frequency note table plus an alias map for `label_to_hz`.
pub struct NoteTable {
    /// Sorted ascending by `hz`; log2(hz) nearest-neighbor lookup binary-searches this.
    entries: Vec<NoteEntry>,
    /// Alternate input spellings (mid1A/A#/B at the mid1/mid2 boundary, loX abbreviations)
    /// mapped to the canonical label whose frequency they should resolve to.
    aliases: HashMap<String, String>,
}

impl NoteTable {
    fn build() -> Self {
        let mut entries = Vec::with_capacity(OCTAVE_PREFIXES.len() * NOTE_NAMES.len());
        for (band_idx, prefix) in OCTAVE_PREFIXES.iter().enumerate() {
            for (note_idx, note_name) in NOTE_NAMES.iter().enumerate() {
                let semitones_from_a4 = (band_idx as i32 - 4) * 12 + note_idx as i32;
                let hz = A4_HZ * 2f32.powf(semitones_from_a4 as f32 / 12.0);
                entries.push(NoteEntry {
                    label: format!("{prefix}{note_name}"),
                    hz,
                });
            }
        }
        entries.sort_by(|a, b| a.hz.partial_cmp(&b.hz).expect("finite table frequencies"));

        let mut aliases = HashMap::new();
        // mid1A/A#/B at the mid1/mid2 boundary resolve to the mid2 frequency: under
        // the legacy C-anchored convention these notes (scientific octave 2) would
        // have been labeled mid1, but the A-anchored table places them in mid2.
        for note_name in ["A", "A#", "B"] {
            aliases.insert(
                format!("mid1{note_name}"),
                format!("mid2{note_name}"),
            );
        }
        // Abbreviated "lo" prefix is accepted as an alias of the full "low" prefix.
        for note_name in NOTE_NAMES {
            aliases.insert(format!("lo{note_name}"), format!("low{note_name}"));
        }

        Self { entries, aliases }
    }

    /// Nearest-neighbor lookup in log2(Hz) space. Invalid input (`hz <= 0`)
    /// maps to `("unknown", 0.0)`.
    pub fn hz_to_label(&self, hz: f32) -> (String, f32) {
        if hz <= 0.0 || !hz.is_finite() {
            return ("unknown".to_string(), 0.0);
        }
        let target_log = hz.log2();

        let idx = self
            .entries
            .partition_point(|e| e.hz.log2() < target_log);

        let candidate = |i: usize| (i, (self.entries[i].hz.log2() - target_log).abs());
        let best = match (idx.checked_sub(1), idx < self.entries.len()) {
            (Some(lo), true) => {
                let (lo_i, lo_d) = candidate(lo);
                let (hi_i, hi_d) = candidate(idx);
                if lo_d <= hi_d {
                    lo_i
                } else {
                    hi_i
                }
            }
            (Some(lo), false) => lo,
            (None, true) => idx,
            (None, false) => return ("unknown".to_string(), 0.0),
        };

        let entry = &self.entries[best];
        (entry.label.clone(), entry.hz)
    }

    /// Direct table lookup by label, honoring documented aliases. Missing
    /// labels yield `None`; callers treat this as "skip".
    pub fn label_to_hz(&self, label: &str) -> Option<f32> {
        let canonical = self.aliases.get(label).map(String::as_str).unwrap_or(label);
        self.entries
            .iter()
            .find(|e| e.label == canonical)
            .map(|e| e.hz)
    }
}

/// Process-wide frozen note table (A4 = 442 Hz tuning).
pub static NOTE_TABLE: Lazy<NoteTable> = Lazy::new(NoteTable::build);

/// Convenience wrapper over the global table.
pub fn hz_to_label(hz: f32) -> (String, f32) {
    NOTE_TABLE.hz_to_label(hz)
}

/// Convenience wrapper over the global table.
pub fn label_to_hz(label: &str) -> Option<f32> {
    NOTE_TABLE.label_to_hz(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn a4_round_trips_exactly() {
        let (label, hz) = hz_to_label(442.0);
        assert_eq!(label, "hiA");
        assert_relative_eq!(hz, 442.0, epsilon = 1e-3);
    }

    #[test]
    fn mid2_a3_band_boundary() {
        // A3 = 442 * 2^(-12/12) = 221.0 Hz, band mid2 (A3..G#4) per spec.md §3.
        let (label, _) = hz_to_label(221.0);
        assert_eq!(label, "mid2A");
    }

    #[test]
    fn mid1_boundary_example_c4() {
        // mid2C: C4 is one octave-band prefix above mid1's A2..G#3, within mid2's A3..G#4.
        let (label, _) = hz_to_label(263.0);
        assert_eq!(label, "mid2C");
    }

    #[test]
    fn invalid_hz_is_unknown() {
        assert_eq!(hz_to_label(0.0), ("unknown".to_string(), 0.0));
        assert_eq!(hz_to_label(-5.0), ("unknown".to_string(), 0.0));
    }

    #[test]
    fn mid1_alias_resolves_to_mid2_frequency() {
        let aliased = label_to_hz("mid1A").unwrap();
        let canonical = label_to_hz("mid2A").unwrap();
        assert!((aliased - canonical).abs() < 1e-6);
    }

    #[test]
    fn lo_prefix_alias() {
        let aliased = label_to_hz("loC").unwrap();
        let canonical = label_to_hz("lowC").unwrap();
        assert!((aliased - canonical).abs() < 1e-6);
    }

    #[test]
    fn missing_label_is_none() {
        assert_eq!(label_to_hz("nonsenseX9"), None);
    }

    #[test]
    fn round_trip_within_quantization_bin() {
        for test_hz in [100.0_f32, 221.0, 440.0, 880.0, 1320.0] {
            let (label, ref_hz) = hz_to_label(test_hz);
            let looked_up = label_to_hz(&label).unwrap();
            assert!((looked_up - ref_hz).abs() < 1e-3);
            // within one semitone quantization bin of the probed frequency
            let cents = 1200.0 * (test_hz / ref_hz).log2().abs();
            assert!(cents <= 50.0, "cents={cents} for {test_hz}");
        }
    }
}

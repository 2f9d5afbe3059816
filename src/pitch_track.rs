//! Core data model (spec.md §3): `AudioBuffer`, `PitchTrack`, `FrameSet`.

/// Mono 32-bit float samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn peak_amplitude(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }

    /// Peak-normalize to `target` (spec.md §3: "peak normalized to ~0.95").
    /// No-op if the buffer is silent.
    pub fn normalized(&self, target: f32) -> AudioBuffer {
        let peak = self.peak_amplitude();
        if peak <= 0.0 {
            return self.clone();
        }
        let gain = target / peak;
        AudioBuffer {
            samples: self.samples.iter().map(|&s| s * gain).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Windowed view into the source audio centered on `original_frame_index * hop_samples`.
    pub fn window_at(&self, center_sample: usize, half_width: usize) -> &[f32] {
        let start = center_sample.saturating_sub(half_width);
        let end = (center_sample + half_width).min(self.samples.len());
        if start >= end {
            &[]
        } else {
            &self.samples[start..end]
        }
    }
}

/// One frame reported by the external pitch estimator. A sentinel `f0_hz <= 0`
/// denotes "no pitch reported".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    pub f0_hz: f32,
    pub confidence: f32,
}

/// Time-aligned, ordered sequence of frames produced by an external estimator.
#[derive(Debug, Clone)]
pub struct PitchTrack {
    pub frames: Vec<PitchFrame>,
    /// Samples per hop (10ms at 16kHz is the reference hop period).
    pub hop_samples: usize,
}

impl PitchTrack {
    pub fn new(frames: Vec<PitchFrame>, hop_samples: usize) -> Self {
        Self { frames, hop_samples }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A derived, filtered view over a `PitchTrack`: parallel arrays plus the
/// mapping back to the original frame index (spec.md §9 "frame-index
/// bookkeeping"). Every C3 filtering stage produces a new `FrameSet` of equal
/// length across all three fields, never rederiving indices by recomputing
/// earlier filters.
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    pub f0: Vec<f32>,
    pub confidence: Vec<f32>,
    pub original_index: Vec<u32>,
}

impl FrameSet {
    pub fn len(&self) -> usize {
        self.f0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f0.is_empty()
    }

    /// Build a fresh `FrameSet` from a `PitchTrack` with no filtering applied.
    pub fn from_track(track: &PitchTrack) -> Self {
        let mut out = FrameSet::default();
        for (i, frame) in track.frames.iter().enumerate() {
            out.f0.push(frame.f0_hz);
            out.confidence.push(frame.confidence);
            out.original_index.push(i as u32);
        }
        out
    }

    /// Keep only the frames selected by `predicate(f0, confidence)`, preserving order.
    pub fn filter(&self, mut predicate: impl FnMut(f32, f32) -> bool) -> FrameSet {
        let mut out = FrameSet::default();
        for i in 0..self.len() {
            if predicate(self.f0[i], self.confidence[i]) {
                out.f0.push(self.f0[i]);
                out.confidence.push(self.confidence[i]);
                out.original_index.push(self.original_index[i]);
            }
        }
        out
    }

    /// Map the original frame index back to a sample offset into the source audio.
    pub fn center_sample(&self, i: usize, hop_samples: usize) -> usize {
        self.original_index[i] as usize * hop_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scales_to_target() {
        let buf = AudioBuffer::new(vec![0.1, -0.4, 0.2], 16_000);
        let norm = buf.normalized(0.95);
        assert!((norm.peak_amplitude() - 0.95).abs() < 1e-5);
    }

    #[test]
    fn silent_buffer_normalize_is_noop() {
        let buf = AudioBuffer::new(vec![0.0; 10], 16_000);
        let norm = buf.normalized(0.95);
        assert_eq!(norm.peak_amplitude(), 0.0);
    }

    #[test]
    fn frame_set_filter_preserves_original_index() {
        let track = PitchTrack::new(
            vec![
                PitchFrame { f0_hz: 100.0, confidence: 0.9 },
                PitchFrame { f0_hz: -1.0, confidence: 0.0 },
                PitchFrame { f0_hz: 200.0, confidence: 0.8 },
            ],
            160,
        );
        let base = FrameSet::from_track(&track);
        let kept = base.filter(|f0, _| f0 > 0.0);
        assert_eq!(kept.original_index, vec![0, 2]);
    }
}

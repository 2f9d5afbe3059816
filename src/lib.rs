//! Sung vocal range analysis.
//!
//! Pitch-track post-processing, chest/falsetto register classification, and
//! range summarization for a short recorded vocal signal. See each module for
//! its piece of the pipeline; [`pipeline::analyze`] is the entry point.

pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod filter;
pub mod model;
pub mod note_table;
pub mod pipeline;
pub mod pitch_track;
pub mod postprocess;
pub mod summary;

pub use error::{VocalRangeError, VocalRangeResult};
pub use pipeline::{analyze, to_result_map, AnalysisInput, AnalysisOutput};
pub use pitch_track::{AudioBuffer, PitchFrame, PitchTrack};

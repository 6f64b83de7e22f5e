//! Music generation for mixmuse.
//!
//! Melodies come from a [`MelodyModel`] (an interval/duration Markov bundle)
//! and chord beds from a [`ChordModel`] (a scale-degree Markov bundle). Both
//! are loaded per invocation and sampled through a seeded RNG, so a fixed
//! seed reproduces a file exactly.

pub mod bundle;
pub mod chords;
pub mod generate;
pub mod melody;
pub mod prompt;
pub mod sampling;
pub mod style;

pub use bundle::{ChordBundle, MelodyBundle, PitchRange};
pub use chords::ChordModel;
pub use generate::{AdvancedOutput, Generator, StageError};
pub use melody::MelodyModel;
pub use prompt::{resolve_prompt, GenerationPlan, Style};
pub use style::{analyze_library, NoteRange, RhythmStyle, StyleStore, UserStyle};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid bundle {name}: {reason}")]
    InvalidBundle { name: String, reason: String },

    #[error("temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),

    #[error("invalid sequence: {0}")]
    InvalidSequence(String),

    #[error(transparent)]
    Midi(#[from] midi_analysis::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

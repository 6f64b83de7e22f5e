//! Note sequences and Standard MIDI File reading and writing.

pub mod analyze;
pub mod midi_writer;
pub mod note;
pub mod sequence;
pub mod tempo_map;

pub use analyze::{extract_notes, parse_sequence, read_sequence, MidiFileContext};
pub use midi_writer::{sequence_to_midi, write_sequence};
pub use note::TimedNote;
pub use sequence::{
    key_label, KeyMode, KeySignature, NoteSequence, SequenceNote, Tempo, TimeSignature,
    DEFAULT_QPM, DEFAULT_TICKS_PER_QUARTER,
};
pub use tempo_map::TempoMap;

use std::path::PathBuf;

/// Errors from MIDI operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("invalid tempo: {0} qpm")]
    InvalidTempo(f64),

    #[error("event delta of {0} ticks exceeds the 28-bit MIDI limit")]
    DeltaOverflow(u64),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

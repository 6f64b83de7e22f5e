use serde::{Deserialize, Serialize};

/// Ticks per quarter note used for sequences built in memory.
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 220;

/// Tempo assumed when a file or sequence carries none.
pub const DEFAULT_QPM: f64 = 120.0;

const NOTE_NAMES_SHARP: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const NOTE_NAMES_FLAT: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];

/// Pitch classes conventionally spelled with flats.
const FLAT_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10]; // Db, Eb, F, Gb, Ab, Bb

/// Sharps (positive) or flats (negative) of the major key on each tonic pitch class.
const MAJOR_ACCIDENTALS: [i8; 12] = [0, -5, 2, -3, 4, -1, 6, 1, -4, 3, -2, 5];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    #[default]
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// A note with absolute timing in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start_time: f64,
    pub end_time: f64,
    pub program: u8,
    /// Logical part; each instrument becomes its own track on export.
    pub instrument: u8,
    pub is_drum: bool,
}

impl SequenceNote {
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub time: f64,
    pub qpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySignature {
    pub time: f64,
    /// Tonic pitch class 0–11 (C=0, C#=1, ...)
    pub key: u8,
    pub mode: KeyMode,
}

impl KeySignature {
    /// Decode a MIDI key signature meta event (accidental count, minor flag).
    pub fn from_accidentals(time: f64, accidentals: i8, minor: bool) -> Self {
        let major_tonic = (accidentals as i32 * 7).rem_euclid(12) as u8;
        if minor {
            Self {
                time,
                key: (major_tonic + 9) % 12,
                mode: KeyMode::Minor,
            }
        } else {
            Self {
                time,
                key: major_tonic,
                mode: KeyMode::Major,
            }
        }
    }

    /// Accidental count for the MIDI key signature meta event.
    pub fn accidentals(&self) -> i8 {
        let major_tonic = match self.mode {
            KeyMode::Major => self.key % 12,
            KeyMode::Minor => (self.key % 12 + 3) % 12,
        };
        MAJOR_ACCIDENTALS[major_tonic as usize]
    }

    /// Human-readable label such as "C major" or "Eb minor".
    pub fn label(&self) -> String {
        key_label(self.key, self.mode)
    }
}

/// Name a key as "<root> <mode>", spelling flat keys with flats.
pub fn key_label(key: u8, mode: KeyMode) -> String {
    let pc = key % 12;
    let root = if FLAT_ROOTS.contains(&pc) {
        NOTE_NAMES_FLAT[pc as usize]
    } else {
        NOTE_NAMES_SHARP[pc as usize]
    };
    format!("{} {}", root, mode)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub time: f64,
    pub numerator: u8,
    pub denominator: u8,
}

/// Encoding-independent note sequence: timed notes plus tempo and key metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSequence {
    pub ticks_per_quarter: u16,
    pub notes: Vec<SequenceNote>,
    pub tempos: Vec<Tempo>,
    pub key_signatures: Vec<KeySignature>,
    pub time_signatures: Vec<TimeSignature>,
}

impl Default for NoteSequence {
    fn default() -> Self {
        Self {
            ticks_per_quarter: DEFAULT_TICKS_PER_QUARTER,
            notes: Vec::new(),
            tempos: Vec::new(),
            key_signatures: Vec::new(),
            time_signatures: Vec::new(),
        }
    }
}

impl NoteSequence {
    /// End time of the last sounding note.
    pub fn total_time(&self) -> f64 {
        self.notes.iter().map(|n| n.end_time).fold(0.0, f64::max)
    }

    /// Tempo of the first tempo event, if any.
    pub fn first_qpm(&self) -> Option<f64> {
        self.tempos.first().map(|t| t.qpm)
    }

    /// Append another sequence's notes verbatim. Timing is not realigned and
    /// the other sequence's tempo and key metadata are ignored.
    pub fn append_notes(&mut self, other: &NoteSequence) {
        self.notes.extend(other.notes.iter().cloned());
    }
}

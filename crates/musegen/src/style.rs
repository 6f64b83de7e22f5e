//! Learning a user's style from their MIDI library.

use midi_analysis::{read_sequence, KeySignature};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const DEFAULT_TEMPO: f64 = 120.0;
const MAX_COMMON_KEYS: usize = 3;

/// Mean note length under which a library counts as fast, in seconds
const FAST_BELOW: f64 = 0.5;
/// Mean note length over which a library counts as slow, in seconds
const SLOW_ABOVE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RhythmStyle {
    Fast,
    Slow,
    Standard,
}

impl RhythmStyle {
    pub fn from_durations(durations: &[f64]) -> Self {
        if durations.is_empty() {
            return RhythmStyle::Standard;
        }
        let mean = durations.iter().sum::<f64>() / durations.len() as f64;
        if mean < FAST_BELOW {
            RhythmStyle::Fast
        } else if mean > SLOW_ABOVE {
            RhythmStyle::Slow
        } else {
            RhythmStyle::Standard
        }
    }

    /// Sampling temperature for personalised generation.
    pub fn temperature(self) -> f64 {
        match self {
            RhythmStyle::Fast => 0.8,
            RhythmStyle::Slow => 1.2,
            RhythmStyle::Standard => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRange {
    pub min: u8,
    pub max: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
}

impl NoteRange {
    pub fn from_pitches(pitches: &[u8]) -> Self {
        match (pitches.iter().min(), pitches.iter().max()) {
            (Some(&min), Some(&max)) => Self {
                min,
                max,
                avg: Some(
                    pitches.iter().map(|&p| p as f64).sum::<f64>() / pitches.len() as f64,
                ),
            },
            // C4 to C6
            _ => Self {
                min: 60,
                max: 84,
                avg: None,
            },
        }
    }
}

/// What the trainer learned from a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStyle {
    pub avg_tempo: f64,
    pub common_keys: Vec<String>,
    pub note_range: NoteRange,
    pub rhythm_style: RhythmStyle,
}

/// Up to three key labels, most frequent first. Keys are counted per tonic
/// and mode, so A major and A minor are separate entries. Equal counts keep
/// the order in which the keys were first seen.
pub fn common_keys(keys: &[KeySignature]) -> Vec<String> {
    if keys.is_empty() {
        return vec!["C major".to_string()];
    }

    let mut counts: Vec<(String, usize)> = Vec::new();
    for key in keys {
        let label = key.label();
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }
    // sort_by is stable
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(MAX_COMMON_KEYS)
        .map(|(label, _)| label)
        .collect()
}

/// Parse every existing file and summarise it. Missing paths are skipped;
/// a file that exists but cannot be parsed fails the whole analysis.
#[tracing::instrument(skip_all, fields(files = paths.len()))]
pub fn analyze_library(paths: &[PathBuf]) -> Result<UserStyle> {
    let mut tempos = Vec::new();
    let mut keys = Vec::new();
    let mut pitches = Vec::new();
    let mut durations = Vec::new();

    for path in paths {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "skipping missing file");
            continue;
        }
        let sequence = read_sequence(path)?;

        if let Some(qpm) = sequence.first_qpm() {
            tempos.push(qpm);
        }
        if let Some(key) = sequence.key_signatures.first() {
            keys.push(key.clone());
        }
        pitches.extend(sequence.notes.iter().map(|n| n.pitch));
        durations.extend(sequence.notes.iter().map(|n| n.duration()));
    }

    let avg_tempo = if tempos.is_empty() {
        DEFAULT_TEMPO
    } else {
        tempos.iter().sum::<f64>() / tempos.len() as f64
    };

    let style = UserStyle {
        avg_tempo,
        common_keys: common_keys(&keys),
        note_range: NoteRange::from_pitches(&pitches),
        rhythm_style: RhythmStyle::from_durations(&durations),
    };
    tracing::info!(notes = pitches.len(), ?style.rhythm_style, "library analyzed");
    Ok(style)
}

/// The persisted style record. Last writer wins.
#[derive(Debug, Clone)]
pub struct StyleStore {
    path: PathBuf,
}

impl StyleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, style: &UserStyle) -> Result<()> {
        let io_err = |source| Error::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(style).map_err(|source| Error::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<UserStyle>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| Error::Json {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midi_analysis::{write_sequence, KeyMode, NoteSequence, SequenceNote, Tempo};
    use pretty_assertions::assert_eq;

    fn key(key: u8, mode: KeyMode) -> KeySignature {
        KeySignature { time: 0.0, key, mode }
    }

    fn write_midi(dir: &Path, name: &str, qpm: f64, tonic: KeySignature, notes: &[(u8, f64, f64)]) -> PathBuf {
        let sequence = NoteSequence {
            notes: notes
                .iter()
                .map(|&(pitch, start, end)| SequenceNote {
                    pitch,
                    velocity: 90,
                    start_time: start,
                    end_time: end,
                    program: 0,
                    instrument: 0,
                    is_drum: false,
                })
                .collect(),
            tempos: vec![Tempo { time: 0.0, qpm }],
            key_signatures: vec![tonic],
            ..Default::default()
        };
        let path = dir.join(name);
        write_sequence(&sequence, &path).unwrap();
        path
    }

    #[test]
    fn empty_library_gives_defaults() {
        let style = analyze_library(&[]).unwrap();
        assert_eq!(
            style,
            UserStyle {
                avg_tempo: 120.0,
                common_keys: vec!["C major".to_string()],
                note_range: NoteRange {
                    min: 60,
                    max: 84,
                    avg: None
                },
                rhythm_style: RhythmStyle::Standard,
            }
        );
        assert_eq!(
            serde_json::to_value(&style.note_range).unwrap(),
            serde_json::json!({"min": 60, "max": 84})
        );
    }

    #[test]
    fn missing_paths_are_skipped() {
        let style = analyze_library(&[PathBuf::from("/no/such/file.mid")]).unwrap();
        assert_eq!(style.avg_tempo, 120.0);
    }

    #[test]
    fn unparseable_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.mid");
        std::fs::write(&path, b"not midi").unwrap();
        assert!(analyze_library(&[path]).is_err());
    }

    #[test]
    fn library_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_midi(
            dir.path(),
            "a.mid",
            100.0,
            key(9, KeyMode::Minor),
            &[(57, 0.0, 0.25), (64, 0.25, 0.5)],
        );
        let b = write_midi(
            dir.path(),
            "b.mid",
            140.0,
            key(9, KeyMode::Minor),
            &[(72, 0.0, 0.25)],
        );

        let style = analyze_library(&[a, b]).unwrap();
        assert!((style.avg_tempo - 120.0).abs() < 0.01);
        assert_eq!(style.common_keys, vec!["A minor".to_string()]);
        assert_eq!(style.note_range.min, 57);
        assert_eq!(style.note_range.max, 72);
        assert!((style.note_range.avg.unwrap() - 193.0 / 3.0).abs() < 1e-9);
        assert_eq!(style.rhythm_style, RhythmStyle::Fast);
    }

    #[test]
    fn key_ranking_is_stable_on_ties() {
        let keys = [
            key(7, KeyMode::Major),
            key(2, KeyMode::Minor),
            key(3, KeyMode::Major),
            key(2, KeyMode::Minor),
            key(0, KeyMode::Major),
            key(7, KeyMode::Major),
        ];
        // G and D minor tie at 2 and keep first-seen order; Eb beats C the same way
        assert_eq!(
            common_keys(&keys),
            vec![
                "G major".to_string(),
                "D minor".to_string(),
                "Eb major".to_string()
            ]
        );
    }

    #[test]
    fn major_and_minor_on_one_tonic_rank_apart() {
        let keys = [
            key(9, KeyMode::Major),
            key(9, KeyMode::Minor),
            key(0, KeyMode::Major),
            key(9, KeyMode::Minor),
        ];
        assert_eq!(
            common_keys(&keys),
            vec![
                "A minor".to_string(),
                "A major".to_string(),
                "C major".to_string()
            ]
        );
    }

    #[test]
    fn rhythm_thresholds_are_strict() {
        assert_eq!(RhythmStyle::from_durations(&[0.5]), RhythmStyle::Standard);
        assert_eq!(RhythmStyle::from_durations(&[0.49]), RhythmStyle::Fast);
        assert_eq!(RhythmStyle::from_durations(&[2.0]), RhythmStyle::Standard);
        assert_eq!(RhythmStyle::from_durations(&[2.5]), RhythmStyle::Slow);
        assert_eq!(RhythmStyle::from_durations(&[]), RhythmStyle::Standard);
    }

    #[test]
    fn store_round_trip_and_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = StyleStore::new(dir.path().join("nested").join("user_style.json"));
        assert_eq!(store.load().unwrap(), None);

        let style = analyze_library(&[]).unwrap();
        store.save(&style).unwrap();
        assert_eq!(store.load().unwrap(), Some(style));

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\n  \"avg_tempo\""));
    }
}

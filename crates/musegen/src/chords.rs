use midi_analysis::{KeyMode, KeySignature, NoteSequence, SequenceNote, Tempo, TimeSignature};
use rand::Rng;
use std::path::Path;

use crate::bundle::ChordBundle;
use crate::sampling::{check_temperature, sample_weighted};
use crate::Result;

const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR_SCALE: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

const CHORD_VELOCITY: u8 = 80;
/// Chord notes go on their own instrument, after the melody's
pub const CHORD_INSTRUMENT: u8 = 1;

/// Block-triad progression generator over a [`ChordBundle`].
#[derive(Debug, Clone)]
pub struct ChordModel {
    bundle: ChordBundle,
}

impl ChordModel {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let bundle = match path {
            Some(path) => ChordBundle::load(path)?,
            None => ChordBundle::default(),
        };
        tracing::debug!(bundle = %bundle.name, "chord model loaded");
        Ok(Self { bundle })
    }

    pub fn from_bundle(bundle: ChordBundle) -> Result<Self> {
        bundle.validate()?;
        Ok(Self { bundle })
    }

    pub fn bundle(&self) -> &ChordBundle {
        &self.bundle
    }

    /// One block triad per bar for the bundle's bar count, on its own tempo.
    pub fn generate<R: Rng>(&self, rng: &mut R, temperature: f64, mode: KeyMode) -> Result<NoteSequence> {
        let temperature = check_temperature(temperature)?;
        let bundle = &self.bundle;
        let bar_seconds = bundle.beats_per_bar as f64 * 60.0 / bundle.qpm;

        let mut notes = Vec::with_capacity(bundle.bars as usize * 3);
        let mut degree = bundle.start_degree;

        for bar in 0..bundle.bars {
            let start = bar as f64 * bar_seconds;
            for pitch in triad(bundle.octave_root, degree, mode) {
                notes.push(SequenceNote {
                    pitch,
                    velocity: CHORD_VELOCITY,
                    start_time: start,
                    end_time: start + bar_seconds,
                    program: 0,
                    instrument: CHORD_INSTRUMENT,
                    is_drum: false,
                });
            }

            // Dead-end degrees fall back to the opening chord
            degree = bundle
                .degrees
                .get(&degree)
                .and_then(|table| sample_weighted(rng, table, temperature))
                .unwrap_or(bundle.start_degree);
        }

        tracing::debug!(bars = bundle.bars, "chords sampled");
        Ok(NoteSequence {
            notes,
            tempos: vec![Tempo {
                time: 0.0,
                qpm: bundle.qpm,
            }],
            key_signatures: vec![KeySignature {
                time: 0.0,
                key: 0,
                mode,
            }],
            time_signatures: vec![TimeSignature {
                time: 0.0,
                numerator: bundle.beats_per_bar.min(255) as u8,
                denominator: 4,
            }],
            ..Default::default()
        })
    }
}

/// Root-position triad on a scale degree, stacked in thirds from the scale.
pub fn triad(tonic: u8, degree: u8, mode: KeyMode) -> [u8; 3] {
    let scale = match mode {
        KeyMode::Major => &MAJOR_SCALE,
        KeyMode::Minor => &NATURAL_MINOR_SCALE,
    };
    let tone = |step: usize| {
        let d = degree as usize % 7 + step;
        tonic + scale[d % 7] + 12 * (d / 7) as u8
    };
    [tone(0), tone(2), tone(4)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::WeightTable;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    #[test]
    fn triads_follow_the_scale() {
        assert_eq!(triad(48, 0, KeyMode::Major), [48, 52, 55]);
        assert_eq!(triad(48, 4, KeyMode::Major), [55, 59, 62]);
        assert_eq!(triad(48, 0, KeyMode::Minor), [48, 51, 55]);
        // vii wraps into the next octave
        assert_eq!(triad(48, 6, KeyMode::Major), [59, 62, 65]);
    }

    #[test]
    fn sixteen_bars_of_block_triads() {
        let model = ChordModel::load(None).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let sequence = model.generate(&mut rng, 1.0, KeyMode::Major).unwrap();

        assert_eq!(sequence.notes.len(), 48);
        assert!(sequence.notes.iter().all(|n| n.instrument == CHORD_INSTRUMENT));
        // Bar 0 is the tonic chord
        let first: Vec<u8> = sequence.notes[..3].iter().map(|n| n.pitch).collect();
        assert_eq!(first, vec![48, 52, 55]);
        // 4 beats at 120 qpm is 2 seconds per bar
        assert!((sequence.total_time() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn dead_end_degree_returns_to_start() {
        let bundle = ChordBundle {
            bars: 3,
            degrees: BTreeMap::from([(0, WeightTable::from([(4, 1.0)]))]),
            ..ChordBundle::default()
        };
        let model = ChordModel::from_bundle(bundle).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let sequence = model.generate(&mut rng, 1.0, KeyMode::Major).unwrap();

        let roots: Vec<u8> = sequence.notes.chunks(3).map(|c| c[0].pitch).collect();
        assert_eq!(roots, vec![48, 55, 48]);
    }
}

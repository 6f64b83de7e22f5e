use midi_analysis::{KeyMode, KeySignature, NoteSequence, SequenceNote, Tempo, TimeSignature};
use rand::Rng;
use std::path::Path;

use crate::bundle::MelodyBundle;
use crate::sampling::{check_temperature, sample_weighted};
use crate::{Error, Result};

const MELODY_VELOCITY: u8 = 100;

/// Monophonic melody generator over a [`MelodyBundle`].
#[derive(Debug, Clone)]
pub struct MelodyModel {
    bundle: MelodyBundle,
}

impl MelodyModel {
    /// Load from a bundle file, or the built-in bundle when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let bundle = match path {
            Some(path) => MelodyBundle::load(path)?,
            None => MelodyBundle::default(),
        };
        tracing::debug!(bundle = %bundle.name, "melody model loaded");
        Ok(Self { bundle })
    }

    pub fn from_bundle(bundle: MelodyBundle) -> Result<Self> {
        bundle.validate()?;
        Ok(Self { bundle })
    }

    pub fn bundle(&self) -> &MelodyBundle {
        &self.bundle
    }

    /// Sample `seconds` of melody.
    ///
    /// The walk starts on the bundle's start pitch; each following note moves
    /// by a sampled interval, reflecting off the pitch range. The result
    /// carries one tempo (the bundle's) and one key signature (C major).
    pub fn generate<R: Rng>(&self, rng: &mut R, temperature: f64, seconds: f64) -> Result<NoteSequence> {
        let temperature = check_temperature(temperature)?;
        let bundle = &self.bundle;
        let step_seconds = 60.0 / (bundle.qpm * bundle.steps_per_quarter as f64);
        if !(step_seconds.is_finite() && step_seconds > 0.0) {
            return Err(Error::InvalidBundle {
                name: bundle.name.clone(),
                reason: format!("step length {step_seconds}s is not positive"),
            });
        }

        let mut notes = Vec::new();
        let mut pitch = bundle.pitch_range.reflect(bundle.start_pitch as i32);
        let mut time = 0.0;
        let mut first = true;

        while time < seconds {
            let steps = sample_weighted(rng, &bundle.durations, temperature)
                .filter(|&s| s > 0)
                .ok_or_else(|| Error::InvalidBundle {
                    name: bundle.name.clone(),
                    reason: "no usable duration".to_string(),
                })?;
            let end = (time + steps as f64 * step_seconds).min(seconds);
            if !(end > time) {
                return Err(Error::InvalidBundle {
                    name: bundle.name.clone(),
                    reason: format!("note length {steps} steps does not advance time"),
                });
            }

            if bundle.rest_weight > 0.0 && rng.gen_bool(bundle.rest_weight) {
                time = end;
                continue;
            }

            if !first {
                let interval = sample_weighted(rng, &bundle.intervals, temperature).unwrap_or(0);
                pitch = bundle.pitch_range.reflect(pitch as i32 + interval as i32);
            }
            first = false;

            notes.push(SequenceNote {
                pitch,
                velocity: MELODY_VELOCITY,
                start_time: time,
                end_time: end,
                program: 0,
                instrument: 0,
                is_drum: false,
            });
            time = end;
        }

        tracing::debug!(notes = notes.len(), temperature, "melody sampled");
        Ok(NoteSequence {
            notes,
            tempos: vec![Tempo {
                time: 0.0,
                qpm: bundle.qpm,
            }],
            key_signatures: vec![KeySignature {
                time: 0.0,
                key: 0,
                mode: KeyMode::Major,
            }],
            time_signatures: vec![TimeSignature {
                time: 0.0,
                numerator: 4,
                denominator: 4,
            }],
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::PitchRange;
    use crate::sampling::WeightTable;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generate(seed: u64, temperature: f64) -> NoteSequence {
        let model = MelodyModel::load(None).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        model.generate(&mut rng, temperature, 30.0).unwrap()
    }

    #[test]
    fn thirty_seconds_inside_range() {
        let sequence = generate(1, 1.0);
        assert!(!sequence.notes.is_empty());
        assert!(sequence.total_time() <= 30.0 + 1e-9);
        for note in &sequence.notes {
            assert!((60..=84).contains(&note.pitch));
            assert!(note.end_time > note.start_time);
        }
        assert_eq!(sequence.tempos.len(), 1);
        assert_eq!(sequence.key_signatures[0].key, 0);
    }

    #[test]
    fn notes_never_overlap() {
        let sequence = generate(3, 1.2);
        for pair in sequence.notes.windows(2) {
            assert!(pair[1].start_time >= pair[0].end_time - 1e-9);
        }
    }

    #[test]
    fn seed_makes_output_reproducible() {
        assert_eq!(generate(42, 0.8), generate(42, 0.8));
        assert_ne!(generate(42, 0.8).notes, generate(43, 0.8).notes);
    }

    #[test]
    fn first_note_is_start_pitch() {
        let bundle = MelodyBundle {
            rest_weight: 0.0,
            ..MelodyBundle::default()
        };
        let model = MelodyModel::from_bundle(bundle).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let sequence = model.generate(&mut rng, 1.0, 5.0).unwrap();
        assert_eq!(sequence.notes[0].pitch, 60);
        assert_eq!(sequence.notes[0].start_time, 0.0);
    }

    #[test]
    fn single_interval_bundle_walks_deterministically() {
        let bundle = MelodyBundle {
            name: "up".to_string(),
            qpm: 60.0,
            steps_per_quarter: 1,
            pitch_range: PitchRange { min: 60, max: 62 },
            start_pitch: 60,
            intervals: WeightTable::from([(1, 1.0)]),
            durations: WeightTable::from([(1, 1.0)]),
            rest_weight: 0.0,
        };
        let model = MelodyModel::from_bundle(bundle).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let sequence = model.generate(&mut rng, 1.0, 5.0).unwrap();

        let pitches: Vec<u8> = sequence.notes.iter().map(|n| n.pitch).collect();
        // 62 + 1 reflects back to 61
        assert_eq!(pitches, vec![60, 61, 62, 61, 62]);
    }

    #[test]
    fn huge_tempo_bundle_is_refused() {
        let bundle = MelodyBundle {
            qpm: 1e300,
            ..MelodyBundle::default()
        };
        assert!(matches!(
            MelodyModel::from_bundle(bundle),
            Err(Error::InvalidBundle { .. })
        ));
    }

    #[test]
    fn fastest_allowed_bundle_still_finishes() {
        let bundle = MelodyBundle {
            qpm: crate::bundle::MAX_QPM,
            steps_per_quarter: crate::bundle::MAX_STEPS_PER_QUARTER,
            durations: WeightTable::from([(1, 1.0)]),
            rest_weight: 0.0,
            ..MelodyBundle::default()
        };
        let model = MelodyModel::from_bundle(bundle).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let sequence = model.generate(&mut rng, 1.0, 1.0).unwrap();
        // 1000 qpm at 64 steps per quarter is 1066.7 steps per second
        assert_eq!(sequence.notes.len(), 1067);
        assert!((sequence.total_time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_temperature_is_rejected() {
        let model = MelodyModel::load(None).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            model.generate(&mut rng, 0.0, 30.0),
            Err(Error::InvalidTemperature(_))
        ));
    }
}

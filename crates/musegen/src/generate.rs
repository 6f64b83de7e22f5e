//! The three generation entry points: basic, prompt-driven and personalised.

use midi_analysis::{write_sequence, KeyMode, NoteSequence};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::chords::ChordModel;
use crate::melody::MelodyModel;
use crate::prompt::{resolve_prompt, GenerationPlan};
use crate::style::UserStyle;
use crate::{Error, Result};

/// Length of every generated melody
pub const MELODY_SECONDS: f64 = 30.0;
pub const BASIC_TEMPERATURE: f64 = 1.0;
pub const BASIC_FILE_NAME: &str = "generated.mid";

/// A failed stage of prompt-driven generation. The display text is the
/// message reported to callers; the cause is kept as the error source.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Failed to generate melody")]
    Melody(#[source] Error),
    #[error("Failed to generate chords")]
    Chords(#[source] Error),
    #[error("Failed to combine sequences")]
    Combine(#[source] Error),
    #[error("Failed to save MIDI file")]
    Save(#[source] Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvancedOutput {
    pub file: PathBuf,
    pub plan: GenerationPlan,
}

/// Owns the RNG and model locations for one invocation.
pub struct Generator {
    output_dir: PathBuf,
    melody_bundle: Option<PathBuf>,
    chord_bundle: Option<PathBuf>,
    rng: ChaCha8Rng,
}

impl Generator {
    /// `seed` fixes the output; `None` seeds from OS entropy.
    pub fn new(output_dir: impl Into<PathBuf>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            output_dir: output_dir.into(),
            melody_bundle: None,
            chord_bundle: None,
            rng,
        }
    }

    pub fn with_bundles(mut self, melody: Option<PathBuf>, chords: Option<PathBuf>) -> Self {
        self.melody_bundle = melody;
        self.chord_bundle = chords;
        self
    }

    fn melody_model(&self) -> Result<MelodyModel> {
        MelodyModel::load(self.melody_bundle.as_deref())
    }

    /// Thirty seconds at temperature 1.0, written to `generated.mid`.
    #[tracing::instrument(skip(self))]
    pub fn basic(&mut self) -> Result<PathBuf> {
        let model = self.melody_model()?;
        let sequence = model.generate(&mut self.rng, BASIC_TEMPERATURE, MELODY_SECONDS)?;
        self.save(&sequence, BASIC_FILE_NAME)
    }

    /// Plan from the prompt, sample a melody and a chord bed, append the
    /// chords onto the melody and write `ml_generated_<unix-seconds>.mid`.
    #[tracing::instrument(skip(self))]
    pub fn advanced(&mut self, prompt: &str) -> std::result::Result<AdvancedOutput, StageError> {
        let plan = resolve_prompt(prompt);

        let melody = self.planned_melody(&plan).map_err(StageError::Melody)?;

        let chords = ChordModel::load(self.chord_bundle.as_deref())
            .and_then(|model| model.generate(&mut self.rng, plan.temperature, plan.mode))
            .map_err(StageError::Chords)?;

        let combined = combine(melody, &chords).map_err(StageError::Combine)?;

        let file_name = format!("ml_generated_{}.mid", unix_seconds());
        let file = self.save(&combined, &file_name).map_err(StageError::Save)?;

        Ok(AdvancedOutput { file, plan })
    }

    fn planned_melody(&mut self, plan: &GenerationPlan) -> Result<NoteSequence> {
        let model = self.melody_model()?;
        let mut sequence = model.generate(&mut self.rng, plan.temperature, MELODY_SECONDS)?;

        let tempo = sequence
            .tempos
            .first_mut()
            .ok_or_else(|| Error::InvalidSequence("melody has no tempo".to_string()))?;
        tempo.qpm = plan.tempo as f64;

        let key = sequence
            .key_signatures
            .first_mut()
            .ok_or_else(|| Error::InvalidSequence("melody has no key signature".to_string()))?;
        key.key = 0;
        key.mode = plan.mode;

        Ok(sequence)
    }

    /// Melody shaped by a learned style, written to
    /// `personalized_<unix-seconds>.mid`.
    #[tracing::instrument(skip_all)]
    pub fn personalized(&mut self, style: &UserStyle) -> Result<PathBuf> {
        let model = self.melody_model()?;
        let temperature = style.rhythm_style.temperature();
        let mut sequence = model.generate(&mut self.rng, temperature, MELODY_SECONDS)?;

        if let Some(tempo) = sequence.tempos.first_mut() {
            tempo.qpm = style.avg_tempo;
        }
        if !style.common_keys.is_empty() {
            if let Some(key) = sequence.key_signatures.first_mut() {
                // TODO: parse common_keys[0] into a tonic and mode instead of pinning C major
                key.key = 0;
                key.mode = KeyMode::Major;
            }
        }

        self.save(&sequence, &format!("personalized_{}.mid", unix_seconds()))
    }

    fn save(&self, sequence: &NoteSequence, file_name: &str) -> Result<PathBuf> {
        ensure_dir(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        write_sequence(sequence, &path)?;
        tracing::info!(path = %path.display(), notes = sequence.notes.len(), "wrote MIDI");
        Ok(path)
    }
}

/// Melody plus the chord notes, unaligned. The melody's tempo and key stay.
pub fn combine(melody: NoteSequence, chords: &NoteSequence) -> Result<NoteSequence> {
    if let Some(note) = chords
        .notes
        .iter()
        .find(|n| !(n.start_time.is_finite() && n.end_time.is_finite()) || n.start_time < 0.0)
    {
        return Err(Error::InvalidSequence(format!(
            "chord note {} has invalid timing {}..{}",
            note.pitch, note.start_time, note.end_time
        )));
    }
    let mut combined = melody;
    combined.append_notes(chords);
    Ok(combined)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

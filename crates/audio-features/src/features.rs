//! Per-track tempo, key and mood.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decode::decode_file;
use crate::spectral::{argmax, estimate_tempo, frame_rms, mean, Stft, HOP_LENGTH, N_FFT};
use crate::Result;

/// Mean frame RMS above which a track counts as energetic
pub const ENERGY_THRESHOLD: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Energetic,
    Chill,
}

impl Mood {
    pub fn from_rms(mean_rms: f64) -> Self {
        if mean_rms > ENERGY_THRESHOLD {
            Mood::Energetic
        } else {
            Mood::Chill
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFeatures {
    pub file: String,
    /// Beats per minute, two decimals; 0.0 when no pulse was found
    pub tempo: f64,
    /// Dominant pitch class, C = 0
    pub key_index: usize,
    pub mood: Mood,
}

/// One entry of a batch: features, or the reason the file was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureResult {
    Features(TrackFeatures),
    Failed { file: String, error: String },
}

#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn analyze_file(path: &Path) -> Result<TrackFeatures> {
    let audio = decode_file(path)?;

    let spectrogram = Stft::default().analyze(&audio.samples, audio.sample_rate);
    let tempo = estimate_tempo(&spectrogram.onset_envelope(), audio.sample_rate, HOP_LENGTH);
    let key_index = argmax(&spectrogram.mean_chroma());
    let mood = Mood::from_rms(mean(&frame_rms(&audio.samples, N_FFT, HOP_LENGTH)));

    let features = TrackFeatures {
        file: path.to_string_lossy().into_owned(),
        tempo: (tempo * 100.0).round() / 100.0,
        key_index,
        mood,
    };
    tracing::debug!(tempo = features.tempo, key_index, ?mood, "analyzed track");
    Ok(features)
}

/// Analyze every path independently. Failures become `Failed` entries, so
/// the output always has one entry per input, in input order.
pub fn analyze_batch(paths: &[PathBuf]) -> Vec<FeatureResult> {
    paths
        .iter()
        .map(|path| match analyze_file(path) {
            Ok(features) => FeatureResult::Features(features),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "feature extraction failed");
                FeatureResult::Failed {
                    file: path.to_string_lossy().into_owned(),
                    error: e.to_string(),
                }
            }
        })
        .collect()
}

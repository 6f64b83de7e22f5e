//! Audio analysis for mixmuse.
//!
//! Decodes audio files to mono samples and derives the small feature sets the
//! CLI reports: tempo, key index and mood for a batch of tracks, and the
//! centroid/bandwidth/loudness comparison used for mix advice.

pub mod decode;
pub mod features;
pub mod mix;
pub mod spectral;

pub use decode::{decode_audio, decode_file, DecodedAudio, MonoAudio};
pub use features::{analyze_batch, analyze_file, FeatureResult, Mood, TrackFeatures};
pub use mix::{advise, compare, mix_features, AdviceRule, Metric, MixFeatures, MixReport, MixRequest};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("audio contains no samples")]
    EmptyAudio,
}

pub type Result<T> = std::result::Result<T, Error>;

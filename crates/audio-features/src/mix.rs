//! Reference-vs-mix comparison and the advice it produces.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decode::decode_file;
use crate::spectral::{frame_rms, mean, Stft, HOP_LENGTH, N_FFT};
use crate::Result;

/// Paths of the two tracks to compare.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixRequest {
    pub ref_path: PathBuf,
    pub my_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixFeatures {
    /// Mean spectral centroid in Hz
    pub centroid: f64,
    /// Mean spectral bandwidth in Hz
    pub bandwidth: f64,
    /// Mean frame RMS
    pub rms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Centroid,
    Bandwidth,
    Rms,
}

impl Metric {
    fn of(self, features: &MixFeatures) -> f64 {
        match self {
            Metric::Centroid => features.centroid,
            Metric::Bandwidth => features.bandwidth,
            Metric::Rms => features.rms,
        }
    }
}

/// One line of advice per metric: `above` when `mine - reference` exceeds
/// `threshold`, `below` when it is under `-threshold`.
#[derive(Debug, Clone, Copy)]
pub struct AdviceRule {
    pub metric: Metric,
    pub threshold: f64,
    pub above: &'static str,
    pub below: &'static str,
}

pub const ADVICE_RULES: [AdviceRule; 3] = [
    AdviceRule {
        metric: Metric::Centroid,
        threshold: 500.0,
        above: "Your mix is brighter than the reference (reduce highs).",
        below: "Your mix is darker than the reference (boost highs).",
    },
    AdviceRule {
        metric: Metric::Bandwidth,
        threshold: 500.0,
        above: "Your mix has more spread (check stereo imaging).",
        below: "Your mix is narrower (consider widening).",
    },
    AdviceRule {
        metric: Metric::Rms,
        threshold: 0.02,
        above: "Your track is louder/denser (reduce compression/volume).",
        below: "Your track is quieter/thinner (add compression/volume).",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixReport {
    pub reference: MixFeatures,
    pub mine: MixFeatures,
    pub advice: Vec<String>,
}

#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn mix_features(path: &Path) -> Result<MixFeatures> {
    let audio = decode_file(path)?;
    let spectrogram = Stft::default().analyze(&audio.samples, audio.sample_rate);
    let centroids = spectrogram.centroids();
    let bandwidths = spectrogram.bandwidths(&centroids);

    Ok(MixFeatures {
        centroid: mean(&centroids),
        bandwidth: mean(&bandwidths),
        rms: mean(&frame_rms(&audio.samples, N_FFT, HOP_LENGTH)),
    })
}

/// Apply every rule in order. Comparisons are strict, so a difference of
/// exactly the threshold says nothing.
pub fn advise(reference: &MixFeatures, mine: &MixFeatures) -> Vec<String> {
    ADVICE_RULES
        .iter()
        .filter_map(|rule| {
            let diff = rule.metric.of(mine) - rule.metric.of(reference);
            if diff > rule.threshold {
                Some(rule.above.to_string())
            } else if diff < -rule.threshold {
                Some(rule.below.to_string())
            } else {
                None
            }
        })
        .collect()
}

pub fn compare(request: &MixRequest) -> Result<MixReport> {
    let reference = mix_features(&request.ref_path)?;
    let mine = mix_features(&request.my_path)?;
    let advice = advise(&reference, &mine);
    tracing::info!(advice = advice.len(), "mix compared");
    Ok(MixReport {
        reference,
        mine,
        advice,
    })
}

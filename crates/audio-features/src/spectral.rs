//! Short-time Fourier analysis and the frame-level features derived from it.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;

/// Chroma covers A0 to C8
const CHROMA_MIN_HZ: f32 = 27.5;
const CHROMA_MAX_HZ: f32 = 4186.0;

const TEMPO_MIN_BPM: f64 = 30.0;
const TEMPO_MAX_BPM: f64 = 300.0;
/// Centre of the log-normal tempo prior
const TEMPO_PRIOR_BPM: f64 = 120.0;
/// Prior standard deviation, in octaves
const TEMPO_PRIOR_STD: f64 = 1.0;

/// Centred framing of a signal: half a frame of zeros on each side, one frame
/// per hop starting at sample 0.
pub struct CenteredFrames {
    padded: Vec<f32>,
    frame_len: usize,
    hop: usize,
    count: usize,
}

impl CenteredFrames {
    pub fn new(samples: &[f32], frame_len: usize, hop: usize) -> Self {
        let pad = frame_len / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);
        let count = if samples.is_empty() || hop == 0 {
            0
        } else {
            1 + samples.len() / hop
        };
        Self {
            padded,
            frame_len,
            hop,
            count,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.count).map(move |i| {
            let start = i * self.hop;
            let end = (start + self.frame_len).min(self.padded.len());
            &self.padded[start..end]
        })
    }
}

/// Magnitude STFT with a periodic Hann window.
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let window = (0..n_fft)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_fft as f32).cos())
            })
            .collect();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        Self {
            n_fft,
            hop,
            window,
            fft,
        }
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> Spectrogram {
        let bins = self.n_fft / 2 + 1;
        let frames = CenteredFrames::new(samples, self.n_fft, self.hop);
        let mut buf: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.n_fft];

        let magnitudes: Vec<Vec<f32>> = frames
            .iter()
            .map(|frame| {
                for (i, slot) in buf.iter_mut().enumerate() {
                    let sample = frame.get(i).copied().unwrap_or(0.0);
                    *slot = Complex::new(sample * self.window[i], 0.0);
                }
                self.fft.process(&mut buf);
                buf[..bins].iter().map(|c| c.norm()).collect::<Vec<f32>>()
            })
            .collect();

        Spectrogram {
            frames: magnitudes,
            sample_rate,
            n_fft: self.n_fft,
        }
    }
}

impl Default for Stft {
    fn default() -> Self {
        Self::new(N_FFT, HOP_LENGTH)
    }
}

/// Per-frame magnitude spectra, `n_fft / 2 + 1` bins each.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub n_fft: usize,
}

impl Spectrogram {
    pub fn bin_frequencies(&self) -> Vec<f32> {
        let bins = self.n_fft / 2 + 1;
        (0..bins)
            .map(|k| k as f32 * self.sample_rate as f32 / self.n_fft as f32)
            .collect()
    }

    /// Magnitude-weighted mean frequency of each frame. Silent frames give 0.
    pub fn centroids(&self) -> Vec<f32> {
        let freqs = self.bin_frequencies();
        self.frames
            .iter()
            .map(|frame| {
                let total: f32 = frame.iter().sum();
                if total <= f32::EPSILON {
                    return 0.0;
                }
                frame.iter().zip(&freqs).map(|(m, f)| m * f).sum::<f32>() / total
            })
            .collect()
    }

    /// Second-order spectral bandwidth around each frame's centroid.
    pub fn bandwidths(&self, centroids: &[f32]) -> Vec<f32> {
        let freqs = self.bin_frequencies();
        self.frames
            .iter()
            .zip(centroids)
            .map(|(frame, &centroid)| {
                let total: f32 = frame.iter().sum();
                if total <= f32::EPSILON {
                    return 0.0;
                }
                let spread: f32 = frame
                    .iter()
                    .zip(&freqs)
                    .map(|(m, f)| (m / total) * (f - centroid).powi(2))
                    .sum();
                spread.sqrt()
            })
            .collect()
    }

    /// Mean chroma vector: power folded into 12 pitch classes (C = 0), each
    /// frame normalised to its maximum, then averaged over frames.
    pub fn mean_chroma(&self) -> [f32; 12] {
        let classes: Vec<Option<usize>> = self
            .bin_frequencies()
            .into_iter()
            .map(|f| {
                if !(CHROMA_MIN_HZ..=CHROMA_MAX_HZ).contains(&f) {
                    return None;
                }
                let midi = 69.0 + 12.0 * (f / 440.0).log2();
                Some((midi.round() as i64).rem_euclid(12) as usize)
            })
            .collect();

        let mut mean = [0.0f32; 12];
        if self.frames.is_empty() {
            return mean;
        }

        for frame in &self.frames {
            let mut chroma = [0.0f32; 12];
            for (m, class) in frame.iter().zip(&classes) {
                if let Some(c) = class {
                    chroma[*c] += m * m;
                }
            }
            let peak = chroma.iter().cloned().fold(0.0f32, f32::max);
            if peak > 0.0 {
                for (acc, value) in mean.iter_mut().zip(chroma) {
                    *acc += value / peak;
                }
            }
        }

        let n = self.frames.len() as f32;
        for value in &mut mean {
            *value /= n;
        }
        mean
    }

    /// Half-wave-rectified spectral flux of log-compressed magnitudes.
    pub fn onset_envelope(&self) -> Vec<f32> {
        let mut envelope = Vec::with_capacity(self.frames.len());
        let mut previous: Option<Vec<f32>> = None;

        for frame in &self.frames {
            let logged: Vec<f32> = frame.iter().map(|m| (1.0 + 1000.0 * m).ln()).collect();
            let flux: f32 = match &previous {
                Some(prev) => logged
                    .iter()
                    .zip(prev)
                    .map(|(cur, prev)| (cur - prev).max(0.0))
                    .sum(),
                None => 0.0,
            };
            envelope.push(flux);
            previous = Some(logged);
        }
        envelope
    }
}

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Root-mean-square energy of centred frames.
pub fn frame_rms(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    CenteredFrames::new(samples, frame_len, hop)
        .iter()
        .map(|frame| {
            let energy: f32 = frame.iter().map(|s| s * s).sum();
            (energy / frame_len as f32).sqrt()
        })
        .collect()
}

pub fn mean(values: &[f32]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
    }
}

/// Global tempo in BPM from an onset envelope.
///
/// Autocorrelates the envelope over lags spanning 30-300 BPM, weights each lag
/// by a log-normal prior around 120 BPM, and refines the winning lag with a
/// parabolic fit. Returns 0.0 when there is no periodic energy to find.
pub fn estimate_tempo(envelope: &[f32], sample_rate: u32, hop: usize) -> f64 {
    if sample_rate == 0 || hop == 0 {
        return 0.0;
    }
    let frame_rate = sample_rate as f64 / hop as f64;
    let min_lag = ((60.0 * frame_rate / TEMPO_MAX_BPM).ceil() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / TEMPO_MIN_BPM).floor() as usize)
        .min(envelope.len().saturating_sub(1));
    if max_lag < min_lag + 2 || envelope.iter().all(|&v| v <= 0.0) {
        return 0.0;
    }

    let weighted: Vec<f64> = (0..=max_lag)
        .map(|lag| {
            if lag < min_lag {
                return 0.0;
            }
            let acf: f64 = envelope
                .iter()
                .zip(&envelope[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum();
            let bpm = 60.0 * frame_rate / lag as f64;
            let octaves = (bpm / TEMPO_PRIOR_BPM).log2() / TEMPO_PRIOR_STD;
            acf * (-0.5 * octaves * octaves).exp()
        })
        .collect();

    let mut best = min_lag;
    for lag in min_lag..=max_lag {
        if weighted[lag] > weighted[best] {
            best = lag;
        }
    }
    if weighted[best] <= 0.0 {
        return 0.0;
    }

    let mut lag = best as f64;
    if best > min_lag && best < max_lag {
        let (a, b, c) = (weighted[best - 1], weighted[best], weighted[best + 1]);
        let denom = a - 2.0 * b + c;
        if denom < 0.0 {
            lag += 0.5 * (a - c) / denom;
        }
    }

    60.0 * frame_rate / lag
}

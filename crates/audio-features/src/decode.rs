//! Audio file decoding
//!
//! WAV goes through hound and is always available. MP3, FLAC and OGG go
//! through symphonia when the `symphonia-decode` feature is enabled (the
//! default). Everything is decoded up front and folded to mono at the native
//! sample rate.

use std::io::Cursor;
use std::path::Path;

use crate::{Error, Result};

/// Decoded audio, interleaved
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples (L, R, L, R, ...)
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl DecodedAudio {
    /// Total number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Average all channels into one.
    pub fn into_mono(self) -> MonoAudio {
        let channels = self.channels.max(1) as usize;
        let samples = if channels == 1 {
            self.samples
        } else {
            self.samples
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };
        MonoAudio {
            samples,
            sample_rate: self.sample_rate,
        }
    }
}

/// Single-channel samples at the file's native rate.
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

/// Read and decode a file to mono.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn decode_file(path: &Path) -> Result<MonoAudio> {
    let data = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path.extension().and_then(|e| e.to_str());

    let audio = decode_audio(&data, extension)?.into_mono();
    if audio.samples.is_empty() || audio.sample_rate == 0 {
        return Err(Error::EmptyAudio);
    }
    tracing::debug!(
        sample_rate = audio.sample_rate,
        seconds = audio.duration_seconds(),
        "decoded audio"
    );
    Ok(audio)
}

/// Decode WAV audio using hound
pub fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(data))
        .map_err(|e| Error::Decode(format!("failed to parse WAV header: {e}")))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Decode(format!("failed to read float samples: {e}")))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Decode(format!("failed to read int samples: {e}")))?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Decode audio using symphonia (MP3, FLAC, OGG, etc.)
#[cfg(feature = "symphonia-decode")]
pub fn decode_symphonia(data: &[u8], extension: Option<&str>) -> Result<DecodedAudio> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode("no audio track found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("no sample rate".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("failed to create decoder: {e}")))?;

    let track_id = track.id;
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Error::Decode(format!("failed to read packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt frame is skipped, not fatal
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(error = e, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(Error::Decode(format!("failed to decode packet: {e}"))),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend(sample_buf.samples());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode audio from raw bytes
///
/// Tries WAV first (hound), then symphonia formats if the feature is enabled.
pub fn decode_audio(data: &[u8], extension: Option<&str>) -> Result<DecodedAudio> {
    if data.len() >= 4 && &data[0..4] == b"RIFF" {
        return decode_wav(data);
    }

    #[cfg(feature = "symphonia-decode")]
    {
        decode_symphonia(data, extension)
    }

    #[cfg(not(feature = "symphonia-decode"))]
    {
        Err(Error::UnsupportedFormat(format!(
            "{} (enable symphonia-decode for MP3/FLAC/OGG)",
            extension.unwrap_or("unknown")
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Write mono float samples as a WAV file.
    pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    pub fn sine(frequency: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    /// Short decaying 1 kHz bursts on every beat.
    pub fn click_track(bpm: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        let period = (sample_rate as f32 * 60.0 / bpm).round() as usize;
        let burst = (sample_rate as f32 * 0.02) as usize;
        let mut samples = vec![0.0f32; n];
        for start in (0..n).step_by(period) {
            for i in 0..burst.min(n - start) {
                let t = i as f32 / sample_rate as f32;
                let envelope = (-(i as f32) / (burst as f32 / 5.0)).exp();
                samples[start + i] = 0.8 * envelope * (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
            }
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn stereo_wav_bytes(frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames {
                writer.write_sample(16384i16).unwrap();
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decode_int_wav_scales_and_averages_channels() {
        let decoded = decode_audio(&stereo_wav_bytes(100), Some("wav")).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), 100);

        let mono = decoded.into_mono();
        assert_eq!(mono.samples.len(), 100);
        assert!((mono.samples[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn decode_file_reads_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &sine(440.0, 0.5, 0.5, 22050), 22050);

        let audio = decode_file(&path).unwrap();
        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.samples.len(), 11025);
        assert!((audio.duration_seconds() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = decode_file(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn empty_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &[], 22050);
        assert!(matches!(decode_file(&path), Err(Error::EmptyAudio)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = decode_audio(b"not audio at all", Some("mp3"));
        assert!(result.is_err());
    }
}

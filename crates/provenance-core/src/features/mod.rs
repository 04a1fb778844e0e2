//! Acoustic feature extraction
//!
//! A clip is summarized by three short-time analyses over one shared power
//! spectrogram, each averaged across frames and concatenated in a fixed
//! order: timbral (MFCC), harmonic (chroma), spectral contrast. Persisted
//! models assume this exact layout.

mod contrast;
mod harmony;
mod spectrum;
mod timbre;

pub use spectrum::{power_spectrogram, PowerSpectrogram};

use crate::audio;
use crate::config::FeatureConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed-length summary of one clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// Stateless extractor; a pure function of input bytes and configuration
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Length of every vector this extractor produces
    pub fn dimension(&self) -> usize {
        self.config.dimension()
    }

    /// Extract from a mono signal
    pub fn extract_samples(&self, samples: &[f32], sample_rate: u32) -> Result<FeatureVector> {
        if samples.is_empty() || sample_rate == 0 {
            return Err(Error::Decode("no samples to analyze".into()));
        }

        let spectrogram = power_spectrogram(samples, sample_rate, &self.config);

        let mut values = Vec::with_capacity(self.dimension());
        values.extend(timbre::mfcc_means(&spectrogram, &self.config));
        values.extend(harmony::chroma_means(&spectrogram, &self.config));
        values.extend(contrast::contrast_means(&spectrogram, &self.config));

        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Decode("analysis produced non-finite values".into()));
        }

        Ok(FeatureVector(values))
    }

    /// Extract from in-memory audio; `hint` is the file extension if known
    pub fn extract_bytes(&self, bytes: &[u8], hint: Option<&str>) -> Result<FeatureVector> {
        let audio = audio::decode_bytes(bytes, hint)?;
        self.extract_samples(&audio.samples, audio.sample_rate)
    }

    pub fn extract_file(&self, path: &Path) -> Result<FeatureVector> {
        let audio = audio::decode_file(path)?;
        log::debug!(
            "Decoded {}: {} Hz, {} ms",
            path.display(),
            audio.sample_rate,
            audio.duration_ms
        );
        self.extract_samples(&audio.samples, audio.sample_rate)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::io::Cursor;

    fn tone_wav(freq: f32, sample_rate: u32, seconds: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let n = (sample_rate as f32 * seconds) as u32;
            for i in 0..n {
                let t = i as f32 / sample_rate as f32;
                let s = 0.5 * (2.0 * PI * freq * t).sin() + 0.1 * (2.0 * PI * 3.0 * freq * t).sin();
                writer.write_sample((s * 20000.0) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_identical_bytes_give_identical_vectors() {
        let extractor = FeatureExtractor::default();
        let bytes = tone_wav(330.0, 22050, 1.0);

        let first = extractor.extract_bytes(&bytes, Some("wav")).unwrap();
        let second = extractor.extract_bytes(&bytes.clone(), Some("wav")).unwrap();

        let first_bits: Vec<u32> = first.as_slice().iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u32> = second.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn test_vector_length_is_sum_of_parts() {
        let extractor = FeatureExtractor::default();
        for (freq, sr, secs) in [(220.0, 22050, 0.5), (1000.0, 44100, 0.25), (440.0, 8000, 0.01)] {
            let vector = extractor
                .extract_bytes(&tone_wav(freq, sr, secs), Some("wav"))
                .unwrap();
            assert_eq!(vector.len(), 13 + 12 + 7);
            assert!(vector.as_slice().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_custom_config_changes_dimension() {
        let config = FeatureConfig {
            n_mfcc: 20,
            contrast_bands: 4,
            ..FeatureConfig::default()
        };
        let extractor = FeatureExtractor::new(config);
        let vector = extractor
            .extract_bytes(&tone_wav(440.0, 22050, 0.5), Some("wav"))
            .unwrap();
        assert_eq!(vector.len(), 20 + 12 + 5);
        assert_eq!(vector.len(), extractor.dimension());
    }

    #[test]
    fn test_different_tones_differ() {
        let extractor = FeatureExtractor::default();
        let low = extractor.extract_bytes(&tone_wav(110.0, 22050, 0.5), Some("wav")).unwrap();
        let high = extractor.extract_bytes(&tone_wav(1760.0, 22050, 0.5), Some("wav")).unwrap();
        assert_ne!(low, high);
    }

    #[test]
    fn test_corrupt_input_is_decode_error() {
        let extractor = FeatureExtractor::default();
        let result = extractor.extract_bytes(b"RIFF....WAVEjunk", Some("wav"));
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_extract_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.WAV");
        let bytes = tone_wav(550.0, 16000, 0.5);
        std::fs::write(&path, &bytes).unwrap();

        let extractor = FeatureExtractor::default();
        let from_file = extractor.extract_file(&path).unwrap();
        let from_bytes = extractor.extract_bytes(&bytes, Some("wav")).unwrap();
        assert_eq!(from_file, from_bytes);
    }
}

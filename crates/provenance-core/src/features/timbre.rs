//! Mel-frequency cepstral coefficients
//!
//! power spectrum → mel filterbank → dB (clamped to `top_db` below the
//! clip's peak) → orthonormal DCT-II → first `n_mfcc` coefficients.

use super::spectrum::{mean_over_frames, PowerSpectrogram};
use crate::config::FeatureConfig;
use std::f32::consts::PI;

const AMIN: f32 = 1e-10;

/// Triangular mel filterbank stored as sparse (bin, weight) rows
pub struct MelFilterBank {
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelFilterBank {
    pub fn new(n_mels: usize, fft_size: usize, sample_rate: u32) -> Self {
        let num_bins = fft_size / 2 + 1;
        let nyquist = sample_rate as f32 / 2.0;
        let mel_max = hz_to_mel(nyquist);

        let hz_points: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
            .collect();

        let filters = (0..n_mels)
            .map(|m| {
                let (lower, center, upper) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
                (0..num_bins)
                    .filter_map(|bin| {
                        let freq = bin as f32 * sample_rate as f32 / fft_size as f32;
                        let weight = if freq > lower && freq <= center {
                            (freq - lower) / (center - lower)
                        } else if freq > center && freq < upper {
                            (upper - freq) / (upper - center)
                        } else {
                            0.0
                        };
                        (weight > 0.0).then_some((bin, weight))
                    })
                    .collect()
            })
            .collect();

        Self { filters }
    }

    pub fn num_filters(&self) -> usize {
        self.filters.len()
    }

    /// Mel band energies of one power frame
    pub fn apply(&self, frame: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| filter.iter().map(|&(bin, w)| frame[bin] * w).sum())
            .collect()
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Orthonormal DCT-II basis, `n_out` rows of length `n_in`
fn dct_basis(n_out: usize, n_in: usize) -> Vec<Vec<f32>> {
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / n_in as f32).sqrt()
            } else {
                (2.0 / n_in as f32).sqrt()
            };
            (0..n_in)
                .map(|n| scale * (PI * k as f32 * (2 * n + 1) as f32 / (2 * n_in) as f32).cos())
                .collect()
        })
        .collect()
}

/// Per-coefficient MFCC means over all frames
pub fn mfcc_means(spectrogram: &PowerSpectrogram, config: &FeatureConfig) -> Vec<f32> {
    let bank = MelFilterBank::new(config.n_mels, spectrogram.fft_size, spectrogram.sample_rate);

    let mut mel_db: Vec<Vec<f32>> = spectrogram
        .frames
        .iter()
        .map(|frame| {
            bank.apply(frame)
                .into_iter()
                .map(|e| 10.0 * e.max(AMIN).log10())
                .collect()
        })
        .collect();

    let peak = mel_db
        .iter()
        .flatten()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - config.top_db;
    for value in mel_db.iter_mut().flatten() {
        *value = value.max(floor);
    }

    let basis = dct_basis(config.n_mfcc, bank.num_filters());
    let coefficients: Vec<Vec<f32>> = mel_db
        .iter()
        .map(|frame| {
            basis
                .iter()
                .map(|row| row.iter().zip(frame).map(|(b, e)| b * e).sum())
                .collect()
        })
        .collect();

    mean_over_frames(&coefficients, config.n_mfcc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mel_roundtrip() {
        for hz in [0.0f32, 440.0, 1000.0, 8000.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 0.05);
        }
    }

    #[test]
    fn test_filterbank_shape() {
        let bank = MelFilterBank::new(40, 2048, 22050);
        assert_eq!(bank.num_filters(), 40);
        let energies = bank.apply(&vec![1.0; 1025]);
        assert_eq!(energies.len(), 40);
        assert!(energies.iter().all(|e| *e > 0.0));
    }

    #[test]
    fn test_dct_basis_is_orthonormal() {
        let basis = dct_basis(8, 8);
        for i in 0..8 {
            for j in 0..8 {
                let dot: f32 = basis[i].iter().zip(&basis[j]).map(|(a, b)| a * b).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(dot, expected, epsilon = 1e-4);
            }
        }
    }
}

//! Chroma profile: STFT energy folded onto pitch classes

use super::spectrum::{mean_over_frames, PowerSpectrogram};
use crate::config::FeatureConfig;

/// Frequency of C0; pitch class 0 is C
const C0_HZ: f32 = 16.351_598;

/// Lowest frequency folded into the profile
const MIN_FREQ_HZ: f32 = 20.0;

/// Pitch class of every FFT bin, `None` for bins outside the folded range
fn bin_pitch_classes(spectrogram: &PowerSpectrogram, n_chroma: usize) -> Vec<Option<usize>> {
    (0..spectrogram.num_bins)
        .map(|bin| {
            let freq = spectrogram.bin_frequency(bin);
            if freq < MIN_FREQ_HZ || freq > spectrogram.nyquist() {
                return None;
            }
            let steps = (n_chroma as f32 * (freq / C0_HZ).log2()).round() as i64;
            Some(steps.rem_euclid(n_chroma as i64) as usize)
        })
        .collect()
}

/// Per-pitch-class chroma means; each frame is max-normalized first
pub fn chroma_means(spectrogram: &PowerSpectrogram, config: &FeatureConfig) -> Vec<f32> {
    let n_chroma = config.n_chroma;
    let classes = bin_pitch_classes(spectrogram, n_chroma);

    let frames: Vec<Vec<f32>> = spectrogram
        .frames
        .iter()
        .map(|frame| {
            let mut chroma = vec![0.0f32; n_chroma];
            for (power, class) in frame.iter().zip(&classes) {
                if let Some(pc) = class {
                    chroma[*pc] += power;
                }
            }
            let peak = chroma.iter().copied().fold(0.0f32, f32::max);
            if peak > 0.0 {
                chroma.iter_mut().for_each(|c| *c /= peak);
            }
            chroma
        })
        .collect();

    mean_over_frames(&frames, n_chroma)
}

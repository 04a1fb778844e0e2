//! Spectral contrast: per octave band, dB gap between peaks and valleys

use super::spectrum::{mean_over_frames, PowerSpectrogram};
use crate::config::FeatureConfig;

const AMIN: f32 = 1e-10;

/// Band edges in Hz: [0, fmin, 2·fmin, ...]; the last band runs to Nyquist
fn band_edges(config: &FeatureConfig, nyquist: f32) -> Vec<(f32, f32)> {
    let mut edges = Vec::with_capacity(config.contrast_bands + 1);
    let mut low = 0.0f32;
    let mut high = config.contrast_fmin;
    for band in 0..=config.contrast_bands {
        let upper = if band == config.contrast_bands { nyquist } else { high };
        edges.push((low, upper));
        low = high;
        high *= 2.0;
    }
    edges
}

/// Contrast of one band's magnitudes
fn band_contrast(magnitudes: &mut [f32], quantile: f32) -> f32 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    magnitudes.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = magnitudes.len();
    let take = ((quantile * n as f32).round() as usize).clamp(1, n);
    let valley = magnitudes[..take].iter().sum::<f32>() / take as f32;
    let peak = magnitudes[n - take..].iter().sum::<f32>() / take as f32;

    10.0 * peak.max(AMIN).log10() - 10.0 * valley.max(AMIN).log10()
}

/// Per-band contrast means (`contrast_bands + 1` values)
pub fn contrast_means(spectrogram: &PowerSpectrogram, config: &FeatureConfig) -> Vec<f32> {
    let edges = band_edges(config, spectrogram.nyquist());
    let last = edges.len() - 1;
    let bins_per_band: Vec<Vec<usize>> = edges
        .iter()
        .enumerate()
        .map(|(band, &(low, high))| {
            (0..spectrogram.num_bins)
                .filter(|&bin| {
                    let freq = spectrogram.bin_frequency(bin);
                    // top band is closed so the Nyquist bin is counted
                    freq >= low && (freq < high || (band == last && freq <= high))
                })
                .collect()
        })
        .collect();

    let frames: Vec<Vec<f32>> = spectrogram
        .frames
        .iter()
        .map(|frame| {
            bins_per_band
                .iter()
                .map(|bins| {
                    let mut magnitudes: Vec<f32> = bins.iter().map(|&b| frame[b].sqrt()).collect();
                    band_contrast(&mut magnitudes, config.contrast_quantile)
                })
                .collect()
        })
        .collect();

    mean_over_frames(&frames, edges.len())
}

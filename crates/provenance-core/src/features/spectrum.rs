//! Short-time power spectrum
//!
//! Frames are centered: the signal is zero-padded by half a window on both
//! sides, so even a clip shorter than one window yields a frame.

use crate::config::FeatureConfig;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

/// Power spectrogram representation
#[derive(Debug, Clone)]
pub struct PowerSpectrogram {
    /// Power values [time_frame][frequency_bin]
    pub frames: Vec<Vec<f32>>,
    /// Bins per frame (fft_size / 2 + 1)
    pub num_bins: usize,
    pub fft_size: usize,
    pub sample_rate: u32,
}

impl PowerSpectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Center frequency of an FFT bin in Hz
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.fft_size as f32
    }

    /// Nyquist frequency in Hz
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }
}

/// Compute the power spectrogram of a mono signal
pub fn power_spectrogram(samples: &[f32], sample_rate: u32, config: &FeatureConfig) -> PowerSpectrogram {
    let fft_size = config.fft_size;
    let hop_size = config.hop_size;
    let num_bins = fft_size / 2 + 1;

    let pad = fft_size / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let num_frames = 1 + (padded.len() - fft_size) / hop_size;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    let window = create_hann_window(fft_size);

    let mut frames = Vec::with_capacity(num_frames);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_size];

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_size;
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * window[i], 0.0);
        }

        fft.process(&mut buffer);

        frames.push(buffer[..num_bins].iter().map(|c| c.norm_sqr()).collect());
    }

    PowerSpectrogram {
        frames,
        num_bins,
        fft_size,
        sample_rate,
    }
}

/// Mean of each row across time frames.
///
/// `rows` is [frame][feature]; the result has one value per feature.
pub fn mean_over_frames(rows: &[Vec<f32>], width: usize) -> Vec<f32> {
    let mut sums = vec![0.0f64; width];
    for row in rows {
        for (sum, &value) in sums.iter_mut().zip(row.iter()) {
            *sum += value as f64;
        }
    }
    let count = rows.len().max(1) as f64;
    sums.into_iter().map(|s| (s / count) as f32).collect()
}

/// Create Hann window
fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let x = i as f32 / (size - 1) as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}

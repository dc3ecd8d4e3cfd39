//! Short-time Fourier transform over the decimated signal.

use std::f64::consts::PI;
use std::sync::Arc;

use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use tracing::debug;

use crate::audio_processor::SampleBuffer;
use crate::config::EngineConfig;

/// Time-ordered complex spectra, one per analysis window.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    frames: Vec<Vec<Complex64>>,
    bin_count: usize,
    hop_size: usize,
    sample_rate: u32,
}

impl Spectrogram {
    pub fn frames(&self) -> &[Vec<Complex64>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Seconds between the starts of consecutive frames.
    pub fn frame_duration(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64
    }

    pub fn frame_start(&self, index: usize) -> f64 {
        index as f64 * self.frame_duration()
    }
}

/// Symmetric Hamming window.
pub fn hamming_window(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Window successive overlapping blocks of `signal` and transform each one.
///
/// Frame `i` starts at sample `i * hop`; the block is zero-padded when the
/// signal runs out. The frame count is `len / (window - hop)`. Frames are
/// computed in parallel and collected in order.
pub fn build_spectrogram(signal: &SampleBuffer, config: &EngineConfig) -> Spectrogram {
    let window_size = config.window_size;
    let hop_size = config.hop_size();
    let samples = signal.samples();

    let frame_count = samples.len() / (window_size - hop_size);
    let window = hamming_window(window_size);
    let fft: Arc<dyn Fft<f64>> = FftPlanner::new().plan_fft_forward(window_size);

    let frames: Vec<Vec<Complex64>> = (0..frame_count)
        .into_par_iter()
        .map(|index| {
            let start = (index * hop_size).min(samples.len());
            let end = (start + window_size).min(samples.len());

            let mut buffer = vec![Complex64::new(0.0, 0.0); window_size];
            for ((slot, &sample), &w) in buffer.iter_mut().zip(&samples[start..end]).zip(&window) {
                *slot = Complex64::new(sample * w, 0.0);
            }
            fft.process(&mut buffer);
            buffer
        })
        .collect();

    debug!(frames = frames.len(), window_size, hop_size, "built spectrogram");
    Spectrogram {
        frames,
        bin_count: window_size,
        hop_size,
        sample_rate: signal.sample_rate(),
    }
}

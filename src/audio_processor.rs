//! PCM handling in front of the spectrogram stage.
//!
//! [`SampleBuffer`] is the mono, rate-tagged signal every pipeline invocation
//! starts from. [`filter`] holds the anti-alias filter and decimator; [`decode`]
//! turns container bytes into a [`SampleBuffer`] for the CLI and HTTP fronts.

pub mod decode;
pub mod filter;

use std::ops::Range;

use crate::error::EngineError;

pub use filter::{downsample, low_pass, preprocess};

/// Mono PCM samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Result<Self, EngineError> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidRate {
                source_rate: sample_rate,
                target_rate: sample_rate,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Mix interleaved multi-channel samples down to mono by averaging each
    /// frame.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self, EngineError> {
        let channels = channels.max(1);
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len() as f64)
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copy of the samples in `range`, clipped to the buffer.
    pub fn excerpt(&self, range: Range<usize>) -> SampleBuffer {
        let end = range.end.min(self.samples.len());
        let start = range.start.min(end);
        SampleBuffer {
            samples: self.samples[start..end].to_vec(),
            sample_rate: self.sample_rate,
        }
    }
}

use std::f64::consts::PI;

use tracing::debug;

use crate::audio_processor::SampleBuffer;
use crate::config::EngineConfig;
use crate::error::EngineError;

/// Single-pole recursive low-pass filter.
///
/// `y[0] = alpha * x[0]`, `y[i] = alpha * x[i] + (1 - alpha) * y[i - 1]`
/// with `alpha = dt / (rc + dt)`.
pub fn low_pass(cutoff_hz: f64, sample_rate: u32, samples: &[f64]) -> Vec<f64> {
    // RC time constant for the filter
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f64;
    let alpha = dt / (rc + dt);

    let mut previous = 0.0;
    samples
        .iter()
        .map(|&x| {
            previous = alpha * x + (1.0 - alpha) * previous;
            previous
        })
        .collect()
}

/// Block-mean decimation by the integer ratio `source_rate / target_rate`.
///
/// The trailing partial block, if any, is averaged over the samples it has.
pub fn downsample(
    samples: &[f64],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f64>, EngineError> {
    let invalid = EngineError::InvalidRate {
        source_rate,
        target_rate,
    };
    if source_rate == 0 || target_rate == 0 || target_rate > source_rate {
        return Err(invalid);
    }

    let ratio = (source_rate / target_rate) as usize;
    if ratio == 0 {
        return Err(invalid);
    }

    Ok(samples
        .chunks(ratio)
        .map(|block| block.iter().sum::<f64>() / block.len() as f64)
        .collect())
}

/// Low-pass at the configured cutoff, then decimate by the configured ratio.
pub fn preprocess(buffer: &SampleBuffer, config: &EngineConfig) -> Result<SampleBuffer, EngineError> {
    let source_rate = buffer.sample_rate();
    let target_rate = source_rate / config.decimation_ratio.max(1);

    let filtered = low_pass(config.cutoff_hz, source_rate, buffer.samples());
    let decimated = downsample(&filtered, source_rate, target_rate)?;

    debug!(
        source_rate,
        target_rate,
        samples = decimated.len(),
        "preprocessed signal"
    );
    SampleBuffer::new(decimated, target_rate)
}

use rustfft::num_complex::Complex64;

use crate::config::{Band, EngineConfig};
use crate::spectrogram::Spectrogram;

/// A locally dominant frequency component within one frame and one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Seconds from the start of the clip.
    pub time: f64,
    pub component: Complex64,
    pub band_index: usize,
    /// Absolute bin index within the frame.
    pub bin: usize,
}

impl Peak {
    pub fn magnitude(&self) -> f64 {
        self.component.norm()
    }
}

#[derive(Debug, Clone, Copy)]
struct BandMax {
    magnitude: f64,
    component: Complex64,
    bin: usize,
}

fn band_max(frame: &[Complex64], band: Band) -> BandMax {
    let mut best = BandMax {
        magnitude: 0.0,
        component: Complex64::new(0.0, 0.0),
        bin: band.start,
    };
    let end = band.end.min(frame.len());
    for bin in band.start..end {
        let magnitude = frame[bin].norm();
        if magnitude > best.magnitude {
            best = BandMax {
                magnitude,
                component: frame[bin],
                bin,
            };
        }
    }
    best
}

/// Pick, per frame, every band whose loudest bin is strictly louder than the
/// mean of all band maxima in that frame.
///
/// Frame `i` is timed at `i * hop / rate`; within a frame a peak is offset by
/// `bin * frame_duration / bin_count`. Output follows frame order, then band
/// order.
pub fn extract_peaks(spectrogram: &Spectrogram, config: &EngineConfig) -> Vec<Peak> {
    if spectrogram.is_empty() || config.bands.is_empty() {
        return Vec::new();
    }

    let bin_offset = spectrogram.frame_duration() / spectrogram.bin_count() as f64;

    let mut peaks = Vec::new();
    let mut maxima = Vec::with_capacity(config.bands.len());

    for (frame_index, frame) in spectrogram.frames().iter().enumerate() {
        maxima.clear();
        maxima.extend(config.bands.iter().map(|&band| band_max(frame, band)));

        let mean = maxima.iter().map(|m| m.magnitude).sum::<f64>() / maxima.len() as f64;
        let frame_start = spectrogram.frame_start(frame_index);

        for (band_index, max) in maxima.iter().enumerate() {
            if max.magnitude > mean {
                peaks.push(Peak {
                    time: frame_start + max.bin as f64 * bin_offset,
                    component: max.component,
                    band_index,
                    bin: max.bin,
                });
            }
        }
    }

    peaks
}

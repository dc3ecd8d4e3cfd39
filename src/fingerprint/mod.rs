//! Fingerprint pipeline glue.
//!
//! Wires preprocessing, spectrogram construction, peak extraction and hashing
//! together. Each invocation owns its buffers and drops them as soon as the
//! next stage's output exists.

pub mod hashing;
pub mod peaks;

use tracing::debug;

use crate::audio_processor::{SampleBuffer, preprocess};
use crate::config::EngineConfig;
use crate::db::RecordingId;
use crate::error::EngineError;
use crate::spectrogram::build_spectrogram;

pub use hashing::{Fingerprint, HashBatch, HashLayout, generate_hashes};
pub use peaks::{Peak, extract_peaks};

/// Placeholder source id for query fingerprints.
pub const QUERY_SOURCE_ID: RecordingId = 0;

/// Fingerprints of one clip plus the figures reported on ingest.
#[derive(Debug, Clone, Default)]
pub struct FingerprintSet {
    pub fingerprints: Vec<Fingerprint>,
    pub duration_secs: f64,
    pub peak_count: usize,
    pub rejected_pairs: usize,
}

impl FingerprintSet {
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// PCM in, peaks out.
pub fn peaks_of(buffer: &SampleBuffer, config: &EngineConfig) -> Result<Vec<Peak>, EngineError> {
    let decimated = preprocess(buffer, config)?;
    let spectrogram = build_spectrogram(&decimated, config);
    drop(decimated);
    Ok(extract_peaks(&spectrogram, config))
}

/// Run the whole pipeline on one clip.
///
/// An empty or silent buffer is not an error: it yields an empty set.
pub fn fingerprint_samples(
    buffer: &SampleBuffer,
    source_id: RecordingId,
    config: &EngineConfig,
) -> Result<FingerprintSet, EngineError> {
    let peaks = peaks_of(buffer, config)?;
    let HashBatch {
        fingerprints,
        rejected,
    } = generate_hashes(&peaks, source_id, config);

    if rejected > 0 {
        debug!(rejected, "dropped landmark pairs overflowing the hash layout");
    }
    debug!(
        peaks = peaks.len(),
        fingerprints = fingerprints.len(),
        "fingerprinted clip"
    );

    Ok(FingerprintSet {
        fingerprints,
        duration_secs: buffer.duration_secs(),
        peak_count: peaks.len(),
        rejected_pairs: rejected,
    })
}

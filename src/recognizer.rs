//! Service façade over the engine and a corpus index.
//!
//! This is what the CLI and the HTTP layer talk to. Fingerprinting runs on the
//! caller's thread; corpus calls go through the bounded retry policy.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::audio_processor::SampleBuffer;
use crate::config::{EngineConfig, RetryPolicy};
use crate::db::{CorpusIndex, Recording, RecordingId, with_retry};
use crate::error::EngineError;
use crate::fingerprint::{QUERY_SOURCE_ID, fingerprint_samples};
use crate::matcher::{MatchOutcome, match_hits};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub recording_id: RecordingId,
    pub name: String,
    pub duration_secs: f64,
    pub fingerprints: usize,
    pub peaks: usize,
}

#[derive(Clone)]
pub struct Recognizer {
    index: Arc<dyn CorpusIndex>,
    config: Arc<EngineConfig>,
    retry: RetryPolicy,
}

impl Recognizer {
    pub fn new(index: Arc<dyn CorpusIndex>, config: EngineConfig) -> Self {
        Self {
            index,
            config: Arc::new(config),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &dyn CorpusIndex {
        self.index.as_ref()
    }

    /// Fingerprint a clip and store it as a new recording.
    pub fn ingest(&self, name: &str, buffer: &SampleBuffer) -> Result<IngestReport, EngineError> {
        let set = fingerprint_samples(buffer, QUERY_SOURCE_ID, &self.config)?;
        let recording_id = with_retry(&self.retry, "insert_recording", || {
            self.index.insert_recording(name, &set.fingerprints)
        })?;

        info!(
            recording_id,
            name,
            fingerprints = set.len(),
            duration_secs = set.duration_secs,
            "ingested recording"
        );
        Ok(IngestReport {
            recording_id,
            name: name.to_string(),
            duration_secs: set.duration_secs,
            fingerprints: set.len(),
            peaks: set.peak_count,
        })
    }

    /// Identify a clip against the corpus.
    pub fn identify(&self, buffer: &SampleBuffer) -> Result<MatchOutcome, EngineError> {
        let set = fingerprint_samples(buffer, QUERY_SOURCE_ID, &self.config)?;
        if set.is_empty() {
            info!("query produced no fingerprints");
            return Ok(MatchOutcome::no_match(0));
        }

        let hashes: Vec<u32> = set.fingerprints.iter().map(|fp| fp.hash).collect();
        let hits = with_retry(&self.retry, "lookup", || self.index.lookup_many(&hashes))?;
        let outcome = match_hits(&set.fingerprints, &hits, &self.config);

        info!(
            matched = outcome.matched,
            recording = outcome.recording().unwrap_or("-"),
            confidence = outcome.confidence,
            score = outcome.score(),
            "identified clip"
        );
        Ok(outcome)
    }

    pub fn recordings(&self) -> Result<Vec<Recording>, EngineError> {
        Ok(with_retry(&self.retry, "recordings", || self.index.recordings())?)
    }

    pub fn recording(&self, id: RecordingId) -> Result<Option<Recording>, EngineError> {
        Ok(with_retry(&self.retry, "recording", || self.index.recording(id))?)
    }

    pub fn delete_recording(&self, id: RecordingId) -> Result<bool, EngineError> {
        let removed = with_retry(&self.retry, "delete_recording", || self.index.delete_recording(id))?;
        if removed {
            info!(recording_id = id, "deleted recording");
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<(), EngineError> {
        with_retry(&self.retry, "clear_all", || self.index.clear_all())?;
        info!("cleared corpus");
        Ok(())
    }
}

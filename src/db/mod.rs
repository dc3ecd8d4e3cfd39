//! Corpus index: where ingested fingerprints live and are looked up.
//!
//! [`CorpusIndex`] is the narrow contract the engine depends on. Two backends
//! implement it: [`MemoryIndex`] for tests and embedding, and the diesel-backed
//! [`SqliteIndex`] used by the binary.

pub mod bindings;
pub mod connector;
pub mod memory;
pub mod retry;

use std::collections::HashMap;

use serde::Serialize;

use crate::error::StorageError;
use crate::fingerprint::Fingerprint;

pub use connector::SqliteIndex;
pub use memory::MemoryIndex;
pub use retry::with_retry;

pub type RecordingId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recording {
    pub id: RecordingId,
    pub name: String,
}

/// One stored fingerprint sharing a looked-up hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusHit {
    pub recording_id: RecordingId,
    pub anchor_time_ms: u32,
    pub recording_name: String,
}

pub trait CorpusIndex: Send + Sync {
    fn create_recording(&self, name: &str) -> Result<RecordingId, StorageError>;

    /// Store all fingerprints for a recording, or none of them.
    ///
    /// The fingerprints' `source_id` is ignored in favour of `recording_id`.
    fn store_fingerprints(
        &self,
        recording_id: RecordingId,
        fingerprints: &[Fingerprint],
    ) -> Result<usize, StorageError>;

    /// Create a recording and store its fingerprints as one unit.
    fn insert_recording(
        &self,
        name: &str,
        fingerprints: &[Fingerprint],
    ) -> Result<RecordingId, StorageError> {
        let recording_id = self.create_recording(name)?;
        if let Err(err) = self.store_fingerprints(recording_id, fingerprints) {
            if let Err(cleanup) = self.delete_recording(recording_id) {
                tracing::warn!(recording_id, %cleanup, "failed to remove half-created recording");
            }
            return Err(err);
        }
        Ok(recording_id)
    }

    fn lookup(&self, hash: u32) -> Result<Vec<CorpusHit>, StorageError>;

    /// Hits for several hashes at once, grouped by hash.
    fn lookup_many(&self, hashes: &[u32]) -> Result<HashMap<u32, Vec<CorpusHit>>, StorageError> {
        let mut grouped = HashMap::new();
        for &hash in hashes {
            if grouped.contains_key(&hash) {
                continue;
            }
            let hits = self.lookup(hash)?;
            if !hits.is_empty() {
                grouped.insert(hash, hits);
            }
        }
        Ok(grouped)
    }

    fn recordings(&self) -> Result<Vec<Recording>, StorageError>;

    fn recording(&self, id: RecordingId) -> Result<Option<Recording>, StorageError>;

    /// Remove a recording and every fingerprint it owns. Returns whether the
    /// recording existed.
    fn delete_recording(&self, id: RecordingId) -> Result<bool, StorageError>;

    fn clear_all(&self) -> Result<(), StorageError>;
}

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::db::{CorpusHit, CorpusIndex, Recording, RecordingId};
use crate::error::StorageError;
use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy)]
struct Posting {
    recording_id: RecordingId,
    anchor_time_ms: u32,
}

#[derive(Debug, Default)]
struct Corpus {
    last_id: RecordingId,
    recordings: BTreeMap<RecordingId, String>,
    // hash -> every stored pair with that hash
    postings: HashMap<u32, Vec<Posting>>,
}

impl Corpus {
    fn add(&mut self, recording_id: RecordingId, fingerprints: &[Fingerprint]) {
        for fp in fingerprints {
            self.postings.entry(fp.hash).or_default().push(Posting {
                recording_id,
                anchor_time_ms: fp.anchor_time_ms,
            });
        }
    }
}

/// Corpus held in process memory.
///
/// Writers take the lock once per call, so a recording's fingerprints become
/// visible to lookups all together.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    corpus: RwLock<Corpus>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.corpus.read().postings.values().map(Vec::len).sum()
    }
}

impl CorpusIndex for MemoryIndex {
    fn create_recording(&self, name: &str) -> Result<RecordingId, StorageError> {
        let mut corpus = self.corpus.write();
        corpus.last_id += 1;
        let id = corpus.last_id;
        corpus.recordings.insert(id, name.to_string());
        Ok(id)
    }

    fn store_fingerprints(
        &self,
        recording_id: RecordingId,
        fingerprints: &[Fingerprint],
    ) -> Result<usize, StorageError> {
        let mut corpus = self.corpus.write();
        if !corpus.recordings.contains_key(&recording_id) {
            return Err(StorageError::UnknownRecording(recording_id));
        }
        corpus.add(recording_id, fingerprints);
        Ok(fingerprints.len())
    }

    fn insert_recording(
        &self,
        name: &str,
        fingerprints: &[Fingerprint],
    ) -> Result<RecordingId, StorageError> {
        let mut corpus = self.corpus.write();
        corpus.last_id += 1;
        let recording_id = corpus.last_id;
        corpus.recordings.insert(recording_id, name.to_string());
        corpus.add(recording_id, fingerprints);
        Ok(recording_id)
    }

    fn lookup(&self, hash: u32) -> Result<Vec<CorpusHit>, StorageError> {
        let corpus = self.corpus.read();
        let Some(postings) = corpus.postings.get(&hash) else {
            return Ok(Vec::new());
        };
        Ok(postings
            .iter()
            .filter_map(|p| {
                corpus.recordings.get(&p.recording_id).map(|name| CorpusHit {
                    recording_id: p.recording_id,
                    anchor_time_ms: p.anchor_time_ms,
                    recording_name: name.clone(),
                })
            })
            .collect())
    }

    fn recordings(&self) -> Result<Vec<Recording>, StorageError> {
        Ok(self
            .corpus
            .read()
            .recordings
            .iter()
            .map(|(&id, name)| Recording {
                id,
                name: name.clone(),
            })
            .collect())
    }

    fn recording(&self, id: RecordingId) -> Result<Option<Recording>, StorageError> {
        Ok(self.corpus.read().recordings.get(&id).map(|name| Recording {
            id,
            name: name.clone(),
        }))
    }

    fn delete_recording(&self, id: RecordingId) -> Result<bool, StorageError> {
        let mut corpus = self.corpus.write();
        if corpus.recordings.remove(&id).is_none() {
            return Ok(false);
        }
        corpus.postings.retain(|_, postings| {
            postings.retain(|p| p.recording_id != id);
            !postings.is_empty()
        });
        Ok(true)
    }

    fn clear_all(&self) -> Result<(), StorageError> {
        let mut corpus = self.corpus.write();
        corpus.recordings.clear();
        corpus.postings.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(hash: u32, anchor_time_ms: u32) -> Fingerprint {
        Fingerprint {
            hash,
            anchor_time_ms,
            source_id: 0,
        }
    }

    #[test]
    fn colliding_hashes_are_all_returned() {
        let index = MemoryIndex::new();
        let id = index
            .insert_recording("a", &[fp(7, 10), fp(7, 10), fp(7, 30), fp(8, 40)])
            .unwrap();

        let hits = index.lookup(7).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.recording_id == id && h.recording_name == "a"));
        assert_eq!(index.fingerprint_count(), 4);
    }

    #[test]
    fn store_into_unknown_recording_fails() {
        let index = MemoryIndex::new();
        assert!(matches!(
            index.store_fingerprints(99, &[fp(1, 1)]),
            Err(StorageError::UnknownRecording(99))
        ));
    }

    #[test]
    fn delete_removes_only_that_recording() {
        let index = MemoryIndex::new();
        let a = index.insert_recording("a", &[fp(1, 0), fp(2, 0)]).unwrap();
        let b = index.insert_recording("b", &[fp(1, 5)]).unwrap();

        assert!(index.delete_recording(a).unwrap());
        assert!(!index.delete_recording(a).unwrap());
        assert!(index.lookup(2).unwrap().is_empty());
        assert_eq!(index.lookup(1).unwrap()[0].recording_id, b);
        assert_eq!(index.recordings().unwrap(), vec![Recording { id: b, name: "b".into() }]);
    }

    #[test]
    fn clear_all_empties_the_corpus() {
        let index = MemoryIndex::new();
        index.insert_recording("a", &[fp(1, 0)]).unwrap();
        index.clear_all().unwrap();
        assert!(index.recordings().unwrap().is_empty());
        assert!(index.lookup(1).unwrap().is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_clear() {
        let index = MemoryIndex::new();
        let first = index.create_recording("a").unwrap();
        index.clear_all().unwrap();
        let second = index.create_recording("b").unwrap();
        assert!(second > first);
        assert_eq!(index.recording(second).unwrap().unwrap().name, "b");
        assert!(index.recording(first).unwrap().is_none());
    }
}

//! Offset-alignment scoring.
//!
//! Every query fingerprint whose hash is found in the corpus contributes one
//! time offset (`query anchor - corpus anchor`) to the hit recording. A true
//! match piles those offsets up around a single value; coincidental
//! collisions scatter them. A recording's score is the size of its densest
//! offset cluster.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::db::{CorpusHit, CorpusIndex, RecordingId};
use crate::error::StorageError;
use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone)]
struct CandidateOffsets {
    recording_id: RecordingId,
    name: String,
    offsets: Vec<i64>,
}

/// Per-query map of candidate recording to offset list, in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct MatchAccumulator {
    candidates: Vec<CandidateOffsets>,
    positions: HashMap<RecordingId, usize>,
}

impl MatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect offsets for every query fingerprint found in `hits_by_hash`.
    pub fn collect(query: &[Fingerprint], hits_by_hash: &HashMap<u32, Vec<CorpusHit>>) -> Self {
        let mut accumulator = Self::new();
        for fp in query {
            if let Some(hits) = hits_by_hash.get(&fp.hash) {
                for hit in hits {
                    accumulator.record(fp.anchor_time_ms, hit);
                }
            }
        }
        accumulator
    }

    pub fn record(&mut self, query_anchor_ms: u32, hit: &CorpusHit) {
        let delta = query_anchor_ms as i64 - hit.anchor_time_ms as i64;
        let position = *self.positions.entry(hit.recording_id).or_insert_with(|| {
            self.candidates.push(CandidateOffsets {
                recording_id: hit.recording_id,
                name: hit.recording_name.clone(),
                offsets: Vec::new(),
            });
            self.candidates.len() - 1
        });
        self.candidates[position].offsets.push(delta);
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn offsets(&self, recording_id: RecordingId) -> Option<&[i64]> {
        self.positions
            .get(&recording_id)
            .map(|&i| self.candidates[i].offsets.as_slice())
    }

    /// Score every candidate, keeping first-seen order.
    pub fn score(&self, tolerance_ms: u32) -> Vec<ScoredCandidate> {
        self.candidates
            .iter()
            .filter_map(|c| {
                densest_offset(&c.offsets, tolerance_ms).map(|(offset_ms, score)| ScoredCandidate {
                    recording_id: c.recording_id,
                    name: c.name.clone(),
                    score,
                    offset_ms,
                })
            })
            .collect()
    }
}

/// Largest group of offsets lying within `tolerance_ms` of each other.
///
/// Returns the group's median offset and its size. Among equally large groups
/// the one with the smallest offsets wins.
pub fn densest_offset(offsets: &[i64], tolerance_ms: u32) -> Option<(i64, usize)> {
    if offsets.is_empty() {
        return None;
    }
    let mut sorted = offsets.to_vec();
    sorted.sort_unstable();

    let tolerance = tolerance_ms as i64;
    let (mut best_start, mut best_len) = (0, 0);
    let mut start = 0;
    for end in 0..sorted.len() {
        while sorted[end] - sorted[start] > tolerance {
            start += 1;
        }
        let len = end - start + 1;
        if len > best_len {
            best_start = start;
            best_len = len;
        }
    }
    Some((sorted[best_start + best_len / 2], best_len))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredCandidate {
    pub recording_id: RecordingId,
    pub name: String,
    pub score: usize,
    /// Query time minus corpus time at the densest alignment.
    pub offset_ms: i64,
}

/// Result of one identification. "No confident match" is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub matched: bool,
    /// Highest-scoring candidate, even when it failed the decision rule.
    pub best: Option<ScoredCandidate>,
    /// Percent, 0 to 100.
    pub confidence: f64,
    pub query_fingerprints: usize,
    /// Best first, at most `max_candidates`.
    pub candidates: Vec<ScoredCandidate>,
}

impl MatchOutcome {
    pub fn no_match(query_fingerprints: usize) -> Self {
        Self {
            matched: false,
            best: None,
            confidence: 0.0,
            query_fingerprints,
            candidates: Vec::new(),
        }
    }

    pub fn recording_id(&self) -> Option<RecordingId> {
        self.best.as_ref().map(|b| b.recording_id)
    }

    pub fn recording(&self) -> Option<&str> {
        self.best.as_ref().map(|b| b.name.as_str())
    }

    pub fn score(&self) -> usize {
        self.best.as_ref().map_or(0, |b| b.score)
    }
}

/// Pick the best candidate and apply the decision rule.
///
/// Ties go to the candidate seen first.
pub fn decide(scored: Vec<ScoredCandidate>, query_fingerprints: usize, config: &EngineConfig) -> MatchOutcome {
    let mut best: Option<&ScoredCandidate> = None;
    for candidate in &scored {
        if best.is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }
    let best = best.cloned();

    let confidence = match (&best, query_fingerprints) {
        (Some(b), n) if n > 0 => (b.score as f64 / n as f64 * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    };
    let matched = best
        .as_ref()
        .is_some_and(|b| confidence > config.min_confidence && b.score > config.min_score);

    let mut candidates = scored;
    // stable: equal scores stay in first-seen order
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(config.max_candidates);

    MatchOutcome {
        matched,
        best,
        confidence,
        query_fingerprints,
        candidates,
    }
}

/// Score pre-fetched hits.
pub fn match_hits(
    query: &[Fingerprint],
    hits_by_hash: &HashMap<u32, Vec<CorpusHit>>,
    config: &EngineConfig,
) -> MatchOutcome {
    if query.is_empty() {
        return MatchOutcome::no_match(0);
    }
    let accumulator = MatchAccumulator::collect(query, hits_by_hash);
    let outcome = decide(accumulator.score(config.offset_tolerance_ms), query.len(), config);

    debug!(
        candidates = accumulator.len(),
        score = outcome.score(),
        confidence = outcome.confidence,
        matched = outcome.matched,
        "scored query"
    );
    outcome
}

/// Look up a query's hashes in `index` and score the candidates.
pub fn match_fingerprints<I: CorpusIndex + ?Sized>(
    query: &[Fingerprint],
    index: &I,
    config: &EngineConfig,
) -> Result<MatchOutcome, StorageError> {
    if query.is_empty() {
        return Ok(MatchOutcome::no_match(0));
    }
    let hashes: Vec<u32> = query.iter().map(|fp| fp.hash).collect();
    let hits_by_hash = index.lookup_many(&hashes)?;
    Ok(match_hits(query, &hits_by_hash, config))
}

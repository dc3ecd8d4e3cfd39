mod common;

use std::sync::Arc;

use tunemark::config::EngineConfig;
use tunemark::fingerprint::{HashLayout, QUERY_SOURCE_ID};
use tunemark::matcher::match_fingerprints;
use tunemark::{MemoryIndex, Recognizer, RetryPolicy, SampleBuffer, SqliteIndex, fingerprint_samples};

use common::{HOP_SAMPLES, RATE, note_sequence, tone_sweep, white_noise};

fn memory_recognizer(config: EngineConfig) -> Recognizer {
    Recognizer::new(Arc::new(MemoryIndex::new()), config).with_retry(RetryPolicy::none())
}

#[test]
fn fingerprinting_is_deterministic() {
    let config = EngineConfig::default();
    let clip = note_sequence(11, RATE as usize * 4);

    let first = fingerprint_samples(&clip, QUERY_SOURCE_ID, &config).unwrap();
    let second = fingerprint_samples(&clip, QUERY_SOURCE_ID, &config).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first.fingerprints, second.fingerprints);
}

#[test]
fn hash_fields_stay_inside_layout() {
    let config = EngineConfig::default();
    let layout = HashLayout::from_config(&config);
    let set = fingerprint_samples(&tone_sweep(10.0, 300.0, 3000.0), 1, &config).unwrap();

    assert!(!set.is_empty());
    for fp in &set.fingerprints {
        let (anchor, target, delta) = layout.unpack(fp.hash);
        assert!(anchor < 1 << 9);
        assert!(target < 1 << 9);
        assert!(delta < 1 << 14);
        assert_eq!(fp.source_id, 1);
    }
}

#[test]
fn self_match_is_full_confidence() {
    let recognizer = memory_recognizer(EngineConfig::default());
    let sweep = tone_sweep(10.0, 300.0, 3000.0);
    let report = recognizer.ingest("A", &sweep).unwrap();
    recognizer.ingest("B", &note_sequence(3, RATE as usize * 10)).unwrap();

    let outcome = recognizer.identify(&sweep).unwrap();
    assert!(outcome.matched);
    assert_eq!(outcome.recording(), Some("A"));
    assert_eq!(outcome.recording_id(), Some(report.recording_id));
    assert_eq!(outcome.confidence, 100.0);
    assert_eq!(outcome.best.as_ref().unwrap().offset_ms, 0);
    assert!(outcome.candidates.len() <= 5);
    assert_eq!(outcome.candidates[0].name, "A");
}

#[test]
fn prefix_of_any_length_self_matches() {
    let recognizer = memory_recognizer(EngineConfig::default());
    let song = note_sequence(8, RATE as usize * 12);
    recognizer.ingest("A", &song).unwrap();
    recognizer.ingest("B", &tone_sweep(12.0, 300.0, 3000.0)).unwrap();

    let prefix = song.excerpt(0..RATE as usize * 5 + 1234);
    let outcome = recognizer.identify(&prefix).unwrap();

    assert!(outcome.matched, "confidence {}", outcome.confidence);
    assert_eq!(outcome.recording(), Some("A"));
    assert_eq!(outcome.confidence, 100.0);
    assert_eq!(outcome.best.unwrap().offset_ms, 0);
}

#[test]
fn excerpt_matches_at_its_offset() {
    let config = EngineConfig {
        offset_tolerance_ms: 2,
        ..EngineConfig::default()
    };
    let recognizer = memory_recognizer(config);

    let song = note_sequence(42, RATE as usize * 10 + 777);
    recognizer.ingest("A", &song).unwrap();
    recognizer.ingest("B", &tone_sweep(9.0, 500.0, 2500.0)).unwrap();

    // the shift stays hop-aligned and inside the frames the recording covers
    let shift_hops = 20;
    let query = song.excerpt(HOP_SAMPLES * shift_hops..song.len() - 1234);
    let outcome = recognizer.identify(&query).unwrap();

    assert!(outcome.matched, "confidence {}", outcome.confidence);
    assert_eq!(outcome.recording(), Some("A"));
    let expected = -(shift_hops as f64 * HOP_SAMPLES as f64 / RATE as f64 * 1000.0);
    let offset = outcome.best.unwrap().offset_ms as f64;
    assert!((offset - expected).abs() <= 2.0, "offset {offset}, expected {expected}");
}

#[test]
fn noise_is_rejected() {
    let recognizer = memory_recognizer(EngineConfig::default());
    recognizer.ingest("A", &tone_sweep(10.0, 300.0, 3000.0)).unwrap();

    let outcome = recognizer.identify(&white_noise(9, 5.0)).unwrap();
    assert!(!outcome.matched);
    assert!(outcome.confidence <= 15.0);
}

#[test]
fn silent_and_empty_queries_are_no_match() {
    let recognizer = memory_recognizer(EngineConfig::default());
    recognizer.ingest("A", &tone_sweep(10.0, 300.0, 3000.0)).unwrap();

    let silence = SampleBuffer::new(vec![0.0; RATE as usize * 5], RATE).unwrap();
    let outcome = recognizer.identify(&silence).unwrap();
    assert!(!outcome.matched);
    assert_eq!(outcome.confidence, 0.0);
    assert_eq!(outcome.query_fingerprints, 0);

    let empty = SampleBuffer::new(Vec::new(), RATE).unwrap();
    let outcome = recognizer.identify(&empty).unwrap();
    assert!(!outcome.matched);
    assert!(outcome.best.is_none());
}

#[test]
fn empty_corpus_is_no_match() {
    let recognizer = memory_recognizer(EngineConfig::default());
    let outcome = recognizer.identify(&tone_sweep(5.0, 300.0, 3000.0)).unwrap();
    assert!(!outcome.matched);
    assert_eq!(outcome.confidence, 0.0);
    assert!(outcome.candidates.is_empty());
}

#[test]
fn sqlite_and_memory_agree() {
    let config = EngineConfig::default();
    let memory = MemoryIndex::new();
    let sqlite = SqliteIndex::in_memory().unwrap();

    let sweep = tone_sweep(6.0, 300.0, 3000.0);
    let notes = note_sequence(5, RATE as usize * 6);
    for (name, clip) in [("sweep", &sweep), ("notes", &notes)] {
        let set = fingerprint_samples(clip, QUERY_SOURCE_ID, &config).unwrap();
        tunemark::CorpusIndex::insert_recording(&memory, name, &set.fingerprints).unwrap();
        tunemark::CorpusIndex::insert_recording(&sqlite, name, &set.fingerprints).unwrap();
    }

    let query = fingerprint_samples(&notes, QUERY_SOURCE_ID, &config).unwrap();
    let from_memory = match_fingerprints(&query.fingerprints, &memory, &config).unwrap();
    let from_sqlite = match_fingerprints(&query.fingerprints, &sqlite, &config).unwrap();

    assert!(from_memory.matched);
    assert_eq!(from_memory.recording(), Some("notes"));
    assert_eq!(from_memory.best, from_sqlite.best);
    assert_eq!(from_memory.confidence, from_sqlite.confidence);
}

#[test]
fn sqlite_corpus_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = dir.path().join("corpus.db");
    let url = url.to_str().unwrap();
    let clip = tone_sweep(5.0, 300.0, 3000.0);

    {
        let recognizer = Recognizer::new(Arc::new(SqliteIndex::open(url).unwrap()), EngineConfig::default());
        recognizer.ingest("kept", &clip).unwrap();
    }

    let recognizer = Recognizer::new(Arc::new(SqliteIndex::open(url).unwrap()), EngineConfig::default());
    assert_eq!(recognizer.recordings().unwrap().len(), 1);
    let outcome = recognizer.identify(&clip).unwrap();
    assert!(outcome.matched);
    assert_eq!(outcome.recording(), Some("kept"));
}

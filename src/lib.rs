//! Landmark-hash audio fingerprinting.
//!
//! Mono PCM flows through [`audio_processor`] (anti-alias filter and
//! decimation), [`spectrogram`] (overlapping Hamming-windowed FFTs),
//! [`fingerprint`] (per-band peak picking and anchor/target hashing) and
//! finally either into a [`db::CorpusIndex`] or through [`matcher`], which
//! scores recordings by how consistently their hash collisions line up in
//! time.

pub mod audio_processor;
pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod recognizer;
pub mod schema;
pub mod server;
pub mod spectrogram;
pub mod tester;

pub use audio_processor::SampleBuffer;
pub use config::{EngineConfig, RetryPolicy, Settings};
pub use db::{CorpusHit, CorpusIndex, MemoryIndex, Recording, RecordingId, SqliteIndex};
pub use error::{EngineError, StorageError};
pub use fingerprint::{Fingerprint, FingerprintSet, Peak, fingerprint_samples};
pub use matcher::{MatchOutcome, ScoredCandidate, match_fingerprints};
pub use recognizer::{IngestReport, Recognizer};

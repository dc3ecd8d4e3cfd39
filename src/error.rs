use thiserror::Error;

use crate::db::RecordingId;

/// Errors surfaced by the fingerprinting engine and its service layer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid sample rate conversion: {source_rate} Hz -> {target_rate} Hz")]
    InvalidRate { source_rate: u32, target_rate: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures of the corpus index.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("corpus unreachable: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("corpus query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("corpus setup failed: {0}")]
    Setup(String),

    #[error("unknown recording {0}")]
    UnknownRecording(RecordingId),
}

impl StorageError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Connection(_) => true,
            StorageError::Query(diesel::result::Error::DatabaseError(_, info)) => {
                let message = info.message().to_ascii_lowercase();
                message.contains("locked") || message.contains("busy")
            }
            _ => false,
        }
    }
}

/// A single anchor/target pair that does not fit the packed hash layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} value {value} does not fit in {bits} bits")]
pub struct MalformedFingerprint {
    pub field: &'static str,
    pub value: i64,
    pub bits: u32,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported or corrupt audio: {0}")]
    Unsupported(#[from] symphonia::core::errors::Error),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("audio track does not declare a sample rate")]
    MissingSampleRate,

    #[error("failed to read audio: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("hash field widths sum to {0} bits, more than 32")]
    HashTooWide(u32),

    #[error("band [{start}, {end}) is empty or exceeds {limit} usable bins")]
    InvalidBand {
        start: usize,
        end: usize,
        limit: usize,
    },

    #[error("hop divisor {divisor} does not divide window size {window}")]
    Hop { window: usize, divisor: usize },
}

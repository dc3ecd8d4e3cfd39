//! Engine parameters and runtime settings.
//!
//! Every tunable literal of the fingerprinting and matching pipeline lives in
//! [`EngineConfig`], which is built once and passed by reference into the
//! engine. Runtime concerns (database location, bind address, retries) live in
//! [`Settings`] and are read from the environment.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

/// Half-open range of spectrum bins `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub start: usize,
    pub end: usize,
}

impl Band {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Fixed parameters of the fingerprinting engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Anti-alias low-pass cutoff in Hz.
    pub cutoff_hz: f64,
    /// Decimation divisor: target rate = source rate / ratio.
    pub decimation_ratio: u32,
    /// Spectrogram window length in samples (also the bin count per frame).
    pub window_size: usize,
    /// Hop size is `window_size / hop_divisor`.
    pub hop_divisor: usize,
    /// Frequency bands searched for per-frame peaks.
    pub bands: Vec<Band>,
    /// Number of look-ahead peaks paired with each anchor.
    pub target_zone: usize,
    pub anchor_bits: u32,
    pub target_bits: u32,
    pub delta_bits: u32,
    /// Confidence (percent) that must be strictly exceeded to declare a match.
    pub min_confidence: f64,
    /// Best score must be strictly greater than this.
    pub min_score: usize,
    /// Offsets within this many milliseconds share a histogram bucket.
    /// Zero buckets exactly equal offsets only.
    pub offset_tolerance_ms: u32,
    /// Number of ranked candidates reported with a match outcome.
    pub max_candidates: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: 5000.0,
            decimation_ratio: 4,
            window_size: 1024,
            hop_divisor: 32,
            bands: vec![
                Band::new(0, 10),
                Band::new(10, 20),
                Band::new(20, 40),
                Band::new(40, 80),
                Band::new(80, 160),
                Band::new(160, 512),
            ],
            target_zone: 5,
            anchor_bits: 9,
            target_bits: 9,
            delta_bits: 14,
            min_confidence: 15.0,
            min_score: 1,
            offset_tolerance_ms: 0,
            max_candidates: 5,
        }
    }
}

impl EngineConfig {
    pub fn hop_size(&self) -> usize {
        self.window_size / self.hop_divisor
    }

    /// Load configuration from a JSON file, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded engine configuration");
                    config
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "invalid engine configuration, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(path = %path.display(), %err, "engine configuration not readable, using defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimation_ratio == 0 {
            return Err(ConfigError::Zero("decimation_ratio"));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Zero("window_size"));
        }
        if self.hop_divisor == 0 {
            return Err(ConfigError::Zero("hop_divisor"));
        }
        if self.window_size % self.hop_divisor != 0 || self.hop_size() == self.window_size {
            return Err(ConfigError::Hop {
                window: self.window_size,
                divisor: self.hop_divisor,
            });
        }
        if self.target_zone == 0 {
            return Err(ConfigError::Zero("target_zone"));
        }
        if self.bands.is_empty() {
            return Err(ConfigError::Zero("bands"));
        }

        let limit = self.window_size / 2;
        for band in &self.bands {
            if band.start >= band.end || band.end > limit {
                return Err(ConfigError::InvalidBand {
                    start: band.start,
                    end: band.end,
                    limit,
                });
            }
        }

        let width = self.anchor_bits + self.target_bits + self.delta_bits;
        if width > 32 {
            return Err(ConfigError::HashTooWide(width));
        }
        Ok(())
    }
}

/// Bounded retry for transient corpus failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Runtime settings for the binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub engine_config: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl Settings {
    pub const DEFAULT_DATABASE_URL: &'static str = "tunemark.db";
    pub const DEFAULT_BIND_ADDR: &'static str = "0.0.0.0:5001";

    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = RetryPolicy::default();
        let max_attempts = env::var("STORAGE_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_attempts)
            .max(1);
        let backoff = env::var("STORAGE_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff);

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| Self::DEFAULT_DATABASE_URL.to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| Self::DEFAULT_BIND_ADDR.to_string()),
            engine_config: env::var_os("ENGINE_CONFIG").map(PathBuf::from),
            retry: RetryPolicy {
                max_attempts,
                backoff,
            },
        }
    }

    /// Engine configuration named by `ENGINE_CONFIG`, or the defaults.
    pub fn engine(&self) -> Result<EngineConfig, ConfigError> {
        let config = match &self.engine_config {
            Some(path) => EngineConfig::load_from_file(path),
            None => EngineConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

use std::fs;
use std::path::Path;

use rand::Rng;
use tracing::{info, warn};

use crate::audio_processor::SampleBuffer;
use crate::audio_processor::decode::{decode_file, is_allowed_extension};
use crate::recognizer::Recognizer;

pub const SNIPPETS_PER_SONG: u32 = 3;
pub const SNIPPET_DURATION_SECS: f64 = 10.0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TestSummary {
    pub total: u32,
    pub correct: u32,
}

impl TestSummary {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

/// Random excerpt of `seconds` from `buffer`, or `None` if it is too short.
pub fn random_excerpt<R: Rng>(buffer: &SampleBuffer, seconds: f64, rng: &mut R) -> Option<SampleBuffer> {
    let len = (seconds * buffer.sample_rate() as f64) as usize;
    if len == 0 || buffer.len() < len {
        return None;
    }
    let start = rng.random_range(0..=buffer.len() - len);
    Some(buffer.excerpt(start..start + len))
}

/// Take random excerpts from every song in `songs_dir` and check that each
/// one is identified as the recording named after its file.
///
/// The songs are expected to be ingested already under their file names.
pub fn run_random_snippet_test(recognizer: &Recognizer, songs_dir: &Path) -> anyhow::Result<TestSummary> {
    let mut summary = TestSummary::default();
    let mut rng = rand::rng();

    info!(
        snippets_per_song = SNIPPETS_PER_SONG,
        snippet_secs = SNIPPET_DURATION_SECS,
        "starting random snippet test"
    );

    for entry in fs::read_dir(songs_dir)? {
        let path = entry?.path();
        let Some(song_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if !path.is_file() || !is_allowed_extension(&song_name) {
            continue;
        }

        let buffer = match decode_file(&path) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(song = %song_name, %err, "skipping undecodable file");
                continue;
            }
        };
        if buffer.duration_secs() < SNIPPET_DURATION_SECS + 5.0 {
            warn!(song = %song_name, "skipping, song is too short");
            continue;
        }

        for i in 0..SNIPPETS_PER_SONG {
            let Some(snippet) = random_excerpt(&buffer, SNIPPET_DURATION_SECS, &mut rng) else {
                continue;
            };
            summary.total += 1;

            let outcome = recognizer.identify(&snippet)?;
            match outcome.recording() {
                Some(found) if outcome.matched && found == song_name => {
                    summary.correct += 1;
                    info!(song = %song_name, snippet = i + 1, score = outcome.score(), "correct");
                }
                Some(found) => {
                    info!(song = %song_name, snippet = i + 1, matched = %found, confidence = outcome.confidence, "incorrect");
                }
                None => info!(song = %song_name, snippet = i + 1, "no match found"),
            }
        }
    }

    info!(
        correct = summary.correct,
        total = summary.total,
        accuracy = summary.accuracy(),
        "random snippet test finished"
    );
    Ok(summary)
}

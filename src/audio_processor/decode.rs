//! Container decoding for the front ends.
//!
//! The engine itself only ever sees [`SampleBuffer`]s; this module is the
//! boundary that turns uploaded or on-disk audio into one.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer as InterleavedBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio_processor::SampleBuffer;
use crate::error::{DecodeError, EngineError};

/// Extensions accepted by the upload endpoints.
pub const ALLOWED_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "ogg", "flac"];

pub fn is_allowed_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<SampleBuffer, EngineError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(DecodeError::from)?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    decode_source(Box::new(file), hint)
}

/// Decode in-memory audio; `file_name` only serves as a format hint.
pub fn decode_bytes(bytes: Vec<u8>, file_name: Option<&str>) -> Result<SampleBuffer, EngineError> {
    let mut hint = Hint::new();
    if let Some((_, ext)) = file_name.and_then(|name| name.rsplit_once('.')) {
        hint.with_extension(ext);
    }
    decode_source(Box::new(Cursor::new(bytes)), hint)
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<SampleBuffer, EngineError> {
    let stream = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(DecodeError::from)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::MissingSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(DecodeError::from)?;

    let mut interleaved = Vec::new();
    let mut channels = 1;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // EOF
            Err(Error::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => break,
            Err(e) => return Err(DecodeError::from(e).into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::DecodeError(err)) => {
                warn!(err, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(DecodeError::from(e).into()),
        };

        channels = decoded.spec().channels.count().max(1);
        let mut packet_samples = InterleavedBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        packet_samples.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(packet_samples.samples());
    }

    let buffer = SampleBuffer::from_interleaved(&interleaved, channels, sample_rate)?;
    debug!(samples = buffer.len(), channels, sample_rate, "decoded audio");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_extensions_case_insensitively() {
        assert!(is_allowed_extension("song.WAV"));
        assert!(is_allowed_extension("a.b.mp3"));
        assert!(!is_allowed_extension("notes.txt"));
        assert!(!is_allowed_extension("wav"));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let result = decode_bytes(vec![0x42; 256], Some("clip.wav"));
        assert!(matches!(result, Err(EngineError::Decode(_))));
    }
}

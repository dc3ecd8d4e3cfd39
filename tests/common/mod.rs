#![allow(dead_code)]

use std::f64::consts::PI;
use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tunemark::SampleBuffer;

pub const RATE: u32 = 44_100;

/// Raw samples per spectrogram hop at the default configuration: the 32-sample
/// hop times the decimation ratio.
pub const HOP_SAMPLES: usize = 32 * 4;

/// Linear sweep from `from_hz` to `to_hz` at amplitude 0.5.
pub fn tone_sweep(seconds: f64, from_hz: f64, to_hz: f64) -> SampleBuffer {
    let len = (seconds * RATE as f64) as usize;
    let slope = (to_hz - from_hz) / seconds;
    let samples = (0..len)
        .map(|i| {
            let t = i as f64 / RATE as f64;
            0.5 * (2.0 * PI * (from_hz * t + 0.5 * slope * t * t)).sin()
        })
        .collect();
    SampleBuffer::new(samples, RATE).unwrap()
}

/// Two-voice sequence of random notes, each held for 50 ms.
pub fn note_sequence(seed: u64, len: usize) -> SampleBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let note_len = RATE as usize / 20;
    let mut samples = Vec::with_capacity(len);
    let mut freqs = (0.0, 0.0);

    for i in 0..len {
        if i % note_len == 0 {
            freqs = (rng.random_range(200.0..1500.0), rng.random_range(1500.0..4000.0));
        }
        let t = i as f64 / RATE as f64;
        samples.push(0.5 * (2.0 * PI * freqs.0 * t).sin() + 0.3 * (2.0 * PI * freqs.1 * t).sin());
    }
    SampleBuffer::new(samples, RATE).unwrap()
}

pub fn white_noise(seed: u64, seconds: f64) -> SampleBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let samples = (0..(seconds * RATE as f64) as usize)
        .map(|_| rng.random_range(-0.4..0.4))
        .collect();
    SampleBuffer::new(samples, RATE).unwrap()
}

/// Encode a buffer as 16-bit mono WAV.
pub fn wav_bytes(buffer: &SampleBuffer) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for &sample in buffer.samples() {
            writer
                .write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f64) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    bytes
}

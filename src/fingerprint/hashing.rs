use serde::Serialize;
use tracing::trace;

use crate::config::EngineConfig;
use crate::db::RecordingId;
use crate::error::MalformedFingerprint;
use crate::fingerprint::peaks::Peak;

/// One anchor/target landmark pair, reduced to a searchable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint {
    pub hash: u32,
    pub anchor_time_ms: u32,
    pub source_id: RecordingId,
}

/// Bit layout `anchor | target | delta`, most significant field first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashLayout {
    pub anchor_bits: u32,
    pub target_bits: u32,
    pub delta_bits: u32,
}

fn field_mask(bits: u32) -> u32 {
    if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 }
}

impl HashLayout {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            anchor_bits: config.anchor_bits,
            target_bits: config.target_bits,
            delta_bits: config.delta_bits,
        }
    }

    /// Pack one pair. Frequencies that overflow their field reject the pair;
    /// the delta is masked to its field width.
    pub fn pack(
        &self,
        anchor_freq: i64,
        target_freq: i64,
        delta_ms: i64,
    ) -> Result<u32, MalformedFingerprint> {
        let anchor = self.check("anchor_freq", anchor_freq, self.anchor_bits)?;
        let target = self.check("target_freq", target_freq, self.target_bits)?;
        if delta_ms < 0 {
            return Err(MalformedFingerprint {
                field: "delta_ms",
                value: delta_ms,
                bits: self.delta_bits,
            });
        }
        let delta = (delta_ms as u64 & field_mask(self.delta_bits) as u64) as u32;

        let target_shift = self.delta_bits;
        let anchor_shift = self.delta_bits + self.target_bits;
        Ok(shl(anchor, anchor_shift) | shl(target, target_shift) | delta)
    }

    /// Split a hash back into `(anchor_freq, target_freq, delta_ms)`.
    pub fn unpack(&self, hash: u32) -> (u32, u32, u32) {
        let delta = hash & field_mask(self.delta_bits);
        let target = shr(hash, self.delta_bits) & field_mask(self.target_bits);
        let anchor = shr(hash, self.delta_bits + self.target_bits) & field_mask(self.anchor_bits);
        (anchor, target, delta)
    }

    fn check(&self, field: &'static str, value: i64, bits: u32) -> Result<u32, MalformedFingerprint> {
        if value < 0 || value as u64 > field_mask(bits) as u64 {
            return Err(MalformedFingerprint { field, value, bits });
        }
        Ok(value as u32)
    }
}

fn shl(value: u32, shift: u32) -> u32 {
    value.checked_shl(shift).unwrap_or(0)
}

fn shr(value: u32, shift: u32) -> u32 {
    value.checked_shr(shift).unwrap_or(0)
}

/// Output of a generation run.
#[derive(Debug, Clone, Default)]
pub struct HashBatch {
    pub fingerprints: Vec<Fingerprint>,
    /// Pairs dropped because a field overflowed.
    pub rejected: usize,
}

/// Pair every peak with the next `target_zone` peaks and hash each pair.
///
/// Every pair yields its own record, so identical hashes within a clip are
/// all kept.
pub fn generate_hashes(peaks: &[Peak], source_id: RecordingId, config: &EngineConfig) -> HashBatch {
    let layout = HashLayout::from_config(config);
    let mut batch = HashBatch::default();

    for (i, anchor) in peaks.iter().enumerate() {
        let end = peaks.len().min(i + 1 + config.target_zone);
        let anchor_time_ms = (anchor.time * 1000.0).round();
        if !(0.0..=u32::MAX as f64).contains(&anchor_time_ms) {
            trace!(anchor_time_ms, "anchor time outside u32 range");
            batch.rejected += end - (i + 1);
            continue;
        }
        let anchor_freq = anchor.magnitude().round() as i64;

        for target in &peaks[i + 1..end] {
            let target_freq = target.magnitude().round() as i64;
            let delta_ms = ((target.time - anchor.time) * 1000.0).round() as i64;

            match layout.pack(anchor_freq, target_freq, delta_ms) {
                Ok(hash) => batch.fingerprints.push(Fingerprint {
                    hash,
                    anchor_time_ms: anchor_time_ms as u32,
                    source_id,
                }),
                Err(err) => {
                    trace!(%err, "rejected landmark pair");
                    batch.rejected += 1;
                }
            }
        }
    }

    batch
}

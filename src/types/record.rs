//! The transmission record flowing through the pipeline.

use std::time::{SystemTime, UNIX_EPOCH};

/// Canonical wire width of a transmitter identity, in bytes.
///
/// Identities are ASCII, NUL-padded to this width on the wire and in the log
/// file. Shorter identities are padded, longer ones truncated.
pub const IDENTITY_LEN: usize = 22;

/// One captured voice transmission fragment.
///
/// This is the fundamental data unit of the crate: produced once per decoded
/// packet by the wire decoder, moved through the capture queue, serialized
/// exactly once by the writer, and handed back out by the log reader during
/// replay. Records are never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionRecord {
    /// Capture instant as 100ns ticks since the Unix epoch, UTC.
    ///
    /// Kept in tick form rather than [`SystemTime`] so that the value written
    /// to disk round-trips exactly.
    pub timestamp_ticks: i64,

    /// Radio frequency in Hz.
    pub frequency: f64,

    /// Modulation code (AM/FM/intercom etc., server-defined).
    pub modulation: u8,

    /// Encryption code (server-defined).
    pub encryption: u8,

    /// Originating unit identifier.
    pub transmitter_unit_id: u32,

    /// Producer-assigned monotonic packet identifier.
    ///
    /// The authoritative ordering key when more than one producer feeds the
    /// same log. Not required to be globally unique across sessions.
    pub packet_id: u64,

    /// Transmitter identity, NUL-trimmed. At most [`IDENTITY_LEN`] bytes.
    pub transmitter_identity: String,

    /// Session sample rate in Hz (not carried on the wire).
    pub sample_rate: u32,

    /// Session channel count (not carried on the wire).
    pub channels: u16,

    /// Coalition / side grouping identifier.
    pub coalition: i32,

    /// Raw audio payload. Empty when recording was suppressed for the
    /// transmitter; all metadata stays intact in that case.
    pub payload: Vec<u8>,
}

impl TransmissionRecord {
    /// Capture timestamp as a [`SystemTime`].
    ///
    /// Tick values from a log file can be arbitrary, so the conversion
    /// saturates instead of overflowing; values outside the representable
    /// range fall back to the epoch.
    pub fn timestamp(&self) -> SystemTime {
        let offset =
            std::time::Duration::from_nanos(self.timestamp_ticks.unsigned_abs().saturating_mul(100));
        let converted = if self.timestamp_ticks >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        };
        converted.unwrap_or(UNIX_EPOCH)
    }

    /// Identity as it will appear on disk: exactly [`IDENTITY_LEN`] bytes,
    /// ASCII, NUL-padded.
    pub fn padded_identity(&self) -> [u8; IDENTITY_LEN] {
        pad_identity(&self.transmitter_identity)
    }
}

/// Current instant as 100ns ticks since the Unix epoch.
pub fn ticks_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(since) => (since.as_nanos() / 100) as i64,
        // Clock before 1970; count backwards.
        Err(err) => -((err.duration().as_nanos() / 100) as i64),
    }
}

/// Pad or truncate an identity to its canonical fixed width.
pub(crate) fn pad_identity(identity: &str) -> [u8; IDENTITY_LEN] {
    let mut fixed = [0u8; IDENTITY_LEN];
    let bytes = identity.as_bytes();
    let len = bytes.len().min(IDENTITY_LEN);
    fixed[..len].copy_from_slice(&bytes[..len]);
    fixed
}

/// Decode a fixed-width identity field, trimming trailing NUL padding only.
///
/// Interior NUL bytes are preserved; only the padding tail is removed, so the
/// transformation is deterministic and reversible for canonical identities.
pub(crate) fn trim_identity(fixed: &[u8]) -> String {
    let end = fixed.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
    String::from_utf8_lossy(&fixed[..end]).to_string()
}

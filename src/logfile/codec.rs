//! Bit-exact binary codec for persisted transmission records.
//!
//! The authoritative on-disk layout, all integers little-endian:
//!
//! | Field                | Type      | Notes                                |
//! |----------------------|-----------|--------------------------------------|
//! | timestamp            | i64       | 100ns ticks since the Unix epoch     |
//! | frequency            | f64       | Hz                                   |
//! | modulation           | u8        |                                      |
//! | encryption           | u8        |                                      |
//! | transmitter unit id  | u32       |                                      |
//! | packet id            | u64       |                                      |
//! | transmitter identity | 22 bytes  | ASCII, NUL-padded/truncated          |
//! | payload length       | i32       |                                      |
//! | payload              | variable  | omitted entirely when length is 0    |
//! | coalition            | i32       |                                      |
//!
//! This is a superset of the wire format: it adds the capture timestamp and
//! keeps the coalition, and drops the wire header and reserved fields.
//! Encode and decode are used identically by the recording writer and the
//! replay reader, so `decode(encode(r)) == r` for every canonical record.

use std::io::{ErrorKind, Read, Write};

use tracing::warn;

use crate::types::{IDENTITY_LEN, SessionConfig, TransmissionRecord, pad_identity, trim_identity};
use crate::{CaptureError, Result};

/// Upper bound on a plausible voice payload. A single Opus-encoded fragment
/// is a few kilobytes; anything near this limit means the length field was
/// read from damaged data.
pub const MAX_PAYLOAD_LEN: i32 = 16 * 1024 * 1024;

/// Serialize one record to `sink`.
///
/// Deterministic for any well-formed record; the only failure mode is an I/O
/// error from the sink itself.
pub fn encode_record<W: Write>(record: &TransmissionRecord, sink: &mut W) -> Result<()> {
    sink.write_all(&record.timestamp_ticks.to_le_bytes())?;
    sink.write_all(&record.frequency.to_le_bytes())?;
    sink.write_all(&[record.modulation, record.encryption])?;
    sink.write_all(&record.transmitter_unit_id.to_le_bytes())?;
    sink.write_all(&record.packet_id.to_le_bytes())?;
    sink.write_all(&pad_identity(&record.transmitter_identity))?;

    sink.write_all(&(record.payload.len() as i32).to_le_bytes())?;
    if !record.payload.is_empty() {
        sink.write_all(&record.payload)?;
    }

    sink.write_all(&record.coalition.to_le_bytes())?;
    Ok(())
}

/// Read exactly one record from `source`.
///
/// Sample rate and channel count are not part of the on-disk format; they are
/// filled in from `session`.
///
/// Returns [`CaptureError::EndOfStream`] when the stream ends cleanly between
/// records or inside a truncated final record, and
/// [`CaptureError::CorruptRecord`] for a structurally invalid one (negative
/// or implausibly large payload length). Both leave the caller free to treat
/// everything read so far as valid.
pub fn decode_record<R: Read>(
    source: &mut R,
    session: &SessionConfig,
) -> Result<TransmissionRecord> {
    // EOF on the first field is the clean end of the log. EOF anywhere later
    // means the final record was cut off mid-write.
    let timestamp_ticks = match read_array::<8, R>(source) {
        Ok(bytes) => i64::from_le_bytes(bytes),
        Err(CaptureError::EndOfStream) => return Err(CaptureError::EndOfStream),
        Err(err) => return Err(err),
    };

    let frequency = f64::from_le_bytes(read_mid_record::<8, R>(source)?);
    let [modulation, encryption] = read_mid_record::<2, R>(source)?;
    let transmitter_unit_id = u32::from_le_bytes(read_mid_record::<4, R>(source)?);
    let packet_id = u64::from_le_bytes(read_mid_record::<8, R>(source)?);
    let identity_bytes = read_mid_record::<IDENTITY_LEN, R>(source)?;
    let transmitter_identity = trim_identity(&identity_bytes);

    let payload_len = i32::from_le_bytes(read_mid_record::<4, R>(source)?);
    if payload_len < 0 {
        return Err(CaptureError::corrupt_record(
            "record payload",
            format!("negative payload length {payload_len}"),
        ));
    }
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(CaptureError::corrupt_record(
            "record payload",
            format!("payload length {payload_len} exceeds {MAX_PAYLOAD_LEN} byte limit"),
        ));
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        source.read_exact(&mut payload).map_err(map_mid_record_eof)?;
    }

    let coalition = i32::from_le_bytes(read_mid_record::<4, R>(source)?);

    Ok(TransmissionRecord {
        timestamp_ticks,
        frequency,
        modulation,
        encryption,
        transmitter_unit_id,
        packet_id,
        transmitter_identity,
        sample_rate: session.sample_rate,
        channels: session.channels,
        coalition,
        payload,
    })
}

fn read_array<const N: usize, R: Read>(source: &mut R) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    source.read_exact(&mut bytes).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            CaptureError::EndOfStream
        } else {
            CaptureError::from(err)
        }
    })?;
    Ok(bytes)
}

fn read_mid_record<const N: usize, R: Read>(source: &mut R) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    source.read_exact(&mut bytes).map_err(map_mid_record_eof)?;
    Ok(bytes)
}

fn map_mid_record_eof(err: std::io::Error) -> CaptureError {
    if err.kind() == ErrorKind::UnexpectedEof {
        warn!("log stream ended mid-record; truncated tail discarded");
        CaptureError::EndOfStream
    } else {
        CaptureError::from(err)
    }
}

//! Voice packet wire layout and parse helpers.
//!
//! One UDP datagram carries one transmission fragment in a dense offset-based
//! layout, all integers little-endian:
//!
//! | Offset      | Size | Field                                |
//! |-------------|------|--------------------------------------|
//! | 0           | 2    | total packet length (informational)  |
//! | 2           | 2    | audio segment length `L`             |
//! | 4           | 2    | frequency segment length (reserved)  |
//! | 6           | L    | audio payload                        |
//! | 6+L         | 8    | frequency, f64 Hz                    |
//! | 6+L+8       | 1    | modulation code                      |
//! | 6+L+9       | 1    | encryption code                      |
//! | 6+L+10      | 4    | transmitter unit id                  |
//! | 6+L+14      | 8    | packet id                            |
//! | 6+L+22      | 1    | hop count (reserved)                 |
//! | 6+L+23      | 22   | transmitter identity, NUL-padded     |
//! | 6+L+45      | 4    | coalition, i32                       |
//!
//! The total packet length is not validated against the actual buffer: some
//! servers pad datagrams and rejecting on mismatch would drop real traffic.
//! The frequency segment length and hop count are carried by the protocol but
//! consumed nowhere in this client; they are parsed and skipped.

use crate::{CaptureError, Result};
use crate::types::IDENTITY_LEN;

/// Fixed-width header preceding the audio payload.
pub const HEADER_LEN: usize = 6;

/// Fixed-width metadata trailing the audio payload.
pub const TRAILER_LEN: usize = 8 + 1 + 1 + 4 + 8 + 1 + IDENTITY_LEN + 4;

/// Smallest frame that can possibly be decoded (empty audio segment).
pub const MIN_FRAME_LEN: usize = HEADER_LEN + TRAILER_LEN;

/// Bounds-checked little-endian parse helpers. Each reports the total byte
/// count the frame would need for the failing read, so callers can log how
/// short the datagram actually was.
pub(crate) fn parse_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = take::<2>(data, offset)?;
    Ok(u16::from_le_bytes(bytes))
}

pub(crate) fn parse_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = take::<4>(data, offset)?;
    Ok(u32::from_le_bytes(bytes))
}

pub(crate) fn parse_u64_le(data: &[u8], offset: usize) -> Result<u64> {
    let bytes = take::<8>(data, offset)?;
    Ok(u64::from_le_bytes(bytes))
}

pub(crate) fn parse_i32_le(data: &[u8], offset: usize) -> Result<i32> {
    let bytes = take::<4>(data, offset)?;
    Ok(i32::from_le_bytes(bytes))
}

pub(crate) fn parse_f64_le(data: &[u8], offset: usize) -> Result<f64> {
    let bytes = take::<8>(data, offset)?;
    Ok(f64::from_le_bytes(bytes))
}

pub(crate) fn parse_u8(data: &[u8], offset: usize) -> Result<u8> {
    let bytes = take::<1>(data, offset)?;
    Ok(bytes[0])
}

pub(crate) fn parse_bytes<'a>(data: &'a [u8], offset: usize, len: usize) -> Result<&'a [u8]> {
    let end = offset.checked_add(len).ok_or(CaptureError::MalformedFrame {
        needed: usize::MAX,
        available: data.len(),
    })?;
    if end > data.len() {
        return Err(CaptureError::MalformedFrame { needed: end, available: data.len() });
    }
    Ok(&data[offset..end])
}

fn take<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    let slice = parse_bytes(data, offset, N)?;
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(slice);
    Ok(bytes)
}

//! Decoding of raw voice datagrams into transmission records.

use std::sync::Arc;

use tracing::trace;

use super::format::{
    HEADER_LEN, TRAILER_LEN, parse_bytes, parse_f64_le, parse_i32_le, parse_u8, parse_u16_le,
    parse_u32_le, parse_u64_le,
};
use crate::directory::TransmitterDirectory;
use crate::Result;
use crate::types::{IDENTITY_LEN, SessionConfig, TransmissionRecord, ticks_now, trim_identity};

/// Decodes one raw UDP payload into a [`TransmissionRecord`].
///
/// Stateless apart from the session constants it stamps onto each record and
/// the transmitter directory it consults for recording permission. Safe to
/// call from whatever thread receives network data; it performs no I/O.
pub struct FrameDecoder {
    session: SessionConfig,
    directory: Arc<dyn TransmitterDirectory>,
}

impl FrameDecoder {
    pub fn new(session: SessionConfig, directory: Arc<dyn TransmitterDirectory>) -> Self {
        Self { session, directory }
    }

    /// Decode a single frame.
    ///
    /// Fails with [`CaptureError::MalformedFrame`] when the buffer is too
    /// short to hold the declared audio segment plus the fixed trailer. A
    /// failure here is local to the one packet; callers drop it and keep
    /// receiving.
    ///
    /// [`CaptureError::MalformedFrame`]: crate::CaptureError::MalformedFrame
    pub fn decode(&self, packet: &[u8]) -> Result<TransmissionRecord> {
        let declared_len = parse_u16_le(packet, 0)?;
        let audio_len = parse_u16_le(packet, 2)? as usize;
        // Reserved by the protocol, consumed by nothing in this client.
        let _freq_segment_len = parse_u16_le(packet, 4)?;

        let audio = parse_bytes(packet, HEADER_LEN, audio_len)?;

        let mut offset = HEADER_LEN + audio_len;
        // Probe the whole trailer up front so a short datagram fails before
        // any field is interpreted.
        parse_bytes(packet, offset, TRAILER_LEN)?;

        let frequency = parse_f64_le(packet, offset)?;
        offset += 8;
        let modulation = parse_u8(packet, offset)?;
        offset += 1;
        let encryption = parse_u8(packet, offset)?;
        offset += 1;
        let transmitter_unit_id = parse_u32_le(packet, offset)?;
        offset += 4;
        let packet_id = parse_u64_le(packet, offset)?;
        offset += 8;
        let _hop_count = parse_u8(packet, offset)?;
        offset += 1;
        let transmitter_identity = trim_identity(parse_bytes(packet, offset, IDENTITY_LEN)?);
        offset += IDENTITY_LEN;
        let coalition = parse_i32_le(packet, offset)?;

        trace!(
            declared_len,
            actual_len = packet.len(),
            audio_len,
            frequency,
            packet_id,
            identity = %transmitter_identity,
            "decoded voice frame"
        );

        // Permission check: metadata always survives, audio only when the
        // transmitter has not opted out of being recorded.
        let payload = if self.directory.allows_recording(&transmitter_identity) {
            audio.to_vec()
        } else {
            trace!(identity = %transmitter_identity, "recording suppressed for transmitter");
            Vec::new()
        };

        Ok(TransmissionRecord {
            timestamp_ticks: ticks_now(),
            frequency,
            modulation,
            encryption,
            transmitter_unit_id,
            packet_id,
            transmitter_identity,
            sample_rate: self.session.sample_rate,
            channels: self.session.channels,
            coalition,
            payload,
        })
    }
}

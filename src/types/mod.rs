//! Core data types shared across the capture and replay pipeline.

mod record;

pub use record::{IDENTITY_LEN, TransmissionRecord, ticks_now};
pub(crate) use record::{pad_identity, trim_identity};

use serde::{Deserialize, Serialize};

/// Capture-session constants that are not present in the wire format.
///
/// The decoder stamps these onto every record it produces. There is no
/// process-wide settings singleton: callers construct one and pass it where
/// it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Audio channel count.
    pub channels: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        // Voice traffic is 48kHz mono unless the session says otherwise.
        Self { sample_rate: 48_000, channels: 1 }
    }
}

/// Identity of the capturing client itself.
///
/// Constructed explicitly by the caller; there is no ambient singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Unique client GUID as used on the control connection.
    pub guid: String,
    /// Human-readable client name.
    pub name: String,
}

impl ClientIdentity {
    pub fn new(guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self { guid: guid.into(), name: name.into() }
    }
}

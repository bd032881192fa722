//! Transmitter directory boundary.
//!
//! The capture pipeline consults a directory of known senders to decide
//! whether a transmitter's audio may be persisted. The directory itself is
//! maintained by the control-connection layer, outside this crate; tests and
//! embedders can use [`StaticDirectory`].

use std::collections::HashMap;

/// Lookup of recording permission by transmitter identity.
pub trait TransmitterDirectory: Send + Sync {
    /// Whether audio from `identity` may be persisted.
    ///
    /// Unknown transmitters default to allowed; the directory only ever
    /// suppresses senders it positively knows have opted out.
    fn allows_recording(&self, identity: &str) -> bool;
}

/// In-memory directory backed by a map of identity to permission.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    permissions: HashMap<String, bool>,
}

impl StaticDirectory {
    /// Empty directory: every transmitter is allowed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an explicit permission for a transmitter.
    pub fn set_permission(&mut self, identity: impl Into<String>, allowed: bool) {
        self.permissions.insert(identity.into(), allowed);
    }
}

impl TransmitterDirectory for StaticDirectory {
    fn allows_recording(&self, identity: &str) -> bool {
        self.permissions.get(identity).copied().unwrap_or(true)
    }
}

//! Capture, persist and replay voice-radio traffic from networked radio
//! simulation servers.
//!
//! Voxlog implements the capture pipeline of a recording client: it decodes
//! the dense offset-based wire format of incoming voice datagrams, moves the
//! decoded records from the network-receive path to a disk-write path without
//! blocking packet reception, and persists an ordered, replayable log of
//! transmissions.
//!
//! # Features
//!
//! - **Wire decoding**: offset-based binary frames to typed records, with
//!   malformed datagrams dropped instead of ending the session
//! - **Asynchronous persistence**: unbounded queue into a single writer task,
//!   FIFO per producer, prompt cancellation on stop
//! - **Replay**: lazy forward-only reader over the persisted log, with a
//!   clean distinction between end-of-file and a damaged tail
//!
//! # Quick Start
//!
//! ## Recording
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voxlog::{ChannelSource, Recorder, SessionConfig, StaticDirectory};
//!
//! #[tokio::main]
//! async fn main() -> voxlog::Result<()> {
//!     let mut recorder =
//!         Recorder::new(SessionConfig::default(), Arc::new(StaticDirectory::new()));
//!     recorder.start("mission.vxl").await?;
//!
//!     // The transport layer pushes raw datagrams into the sender half.
//!     let (packets, source) = ChannelSource::new();
//!     recorder.spawn_source(source)?;
//!     # drop(packets);
//!
//!     let written = recorder.stop().await?;
//!     println!("persisted {written} transmissions");
//!     Ok(())
//! }
//! ```
//!
//! ## Replay
//!
//! ```rust,no_run
//! use voxlog::Voxlog;
//!
//! fn main() -> voxlog::Result<()> {
//!     let mut reader = Voxlog::replay("mission.vxl")?;
//!     while let Some(record) = reader.read_next_record()? {
//!         println!("{} Hz from {}", record.frequency, record.transmitter_identity);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
pub mod directory;
mod error;
pub mod types;

// Capture pipeline
pub mod recorder;
pub mod source;
pub mod wire;

// Persisted log
pub mod logfile;

// Core exports
pub use config::RecorderConfig;
pub use directory::{StaticDirectory, TransmitterDirectory};
pub use error::*;
pub use types::{ClientIdentity, IDENTITY_LEN, SessionConfig, TransmissionRecord, ticks_now};

// Pipeline exports
pub use recorder::{Recorder, RecorderState};
pub use source::{ChannelSource, PacketSource};
pub use wire::FrameDecoder;

// Log exports
pub use logfile::LogReader;

/// Unified entry point for the recording client's core surfaces.
///
/// A convenience factory over [`Recorder`] and [`LogReader`] for callers that
/// do not need to hold the pieces separately.
pub struct Voxlog;

impl Voxlog {
    /// Create an idle recorder with the given session constants and
    /// transmitter directory.
    pub fn recorder(
        session: SessionConfig,
        directory: std::sync::Arc<dyn TransmitterDirectory>,
    ) -> Recorder {
        Recorder::new(session, directory)
    }

    /// Open a persisted transmission log for sequential replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not readable.
    pub fn replay<P: AsRef<std::path::Path>>(path: P) -> Result<LogReader> {
        LogReader::open(path)
    }
}

//! Sequential reader for persisted transmission logs.
//!
//! Provides a lazy, forward-only walk over a recorded log file, yielding one
//! [`TransmissionRecord`] at a time until the file ends or a corrupt record
//! stops the sequence. Restart by reopening; there is no random access.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use voxlog::LogReader;
//!
//! fn replay() -> voxlog::Result<()> {
//!     let mut reader = LogReader::open("mission.vxl")?;
//!     while let Some(record) = reader.read_next_record()? {
//!         println!("packet {} on {} Hz", record.packet_id, record.frequency);
//!     }
//!     println!("replayed {} records", reader.records_read());
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::codec::decode_record;
use crate::types::{SessionConfig, TransmissionRecord};
use crate::{CaptureError, Result};

/// Sequential reader over one log file.
#[derive(Debug)]
pub struct LogReader {
    source: BufReader<File>,
    path: PathBuf,
    session: SessionConfig,
    records_read: u64,
    finished: bool,
}

impl LogReader {
    /// Open a log file for replay with default session constants.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_session(path, SessionConfig::default())
    }

    /// Open a log file for replay, filling each record's sample rate and
    /// channel count from `session`.
    pub fn open_with_session<P: AsRef<Path>>(path: P, session: SessionConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).map_err(|e| CaptureError::io_error(path.clone(), e))?;

        info!("opened transmission log: {}", path.display());
        Ok(Self {
            source: BufReader::new(file),
            path,
            session,
            records_read: 0,
            finished: false,
        })
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at the clean end of the file (including a truncated
    /// final record, which is discarded). A [`CaptureError::CorruptRecord`]
    /// ends the sequence early and is surfaced to the caller; the reader does
    /// not attempt to skip ahead and resynchronize.
    pub fn read_next_record(&mut self) -> Result<Option<TransmissionRecord>> {
        if self.finished {
            return Ok(None);
        }

        match decode_record(&mut self.source, &self.session) {
            Ok(record) => {
                self.records_read += 1;
                Ok(Some(record))
            }
            Err(CaptureError::EndOfStream) => {
                debug!("log ended after {} records", self.records_read);
                self.finished = true;
                Ok(None)
            }
            Err(CaptureError::Io { source, .. }) => {
                self.finished = true;
                Err(CaptureError::io_error(self.path.clone(), source))
            }
            Err(err) => {
                self.finished = true;
                Err(err)
            }
        }
    }

    /// Number of records successfully read so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// The file path this reader was opened from.
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Consume the reader into an iterator with cooperative cancellation.
    ///
    /// The token is checked between records, never mid-record, so a cancelled
    /// replay always stops on a record boundary.
    pub fn records(self, cancel: CancellationToken) -> Records {
        Records { reader: self, cancel }
    }
}

/// Iterator over the records of a log file.
///
/// Yields `Ok(record)` per record, then either ends (clean EOF or
/// cancellation) or yields exactly one terminal `Err` for a damaged tail.
pub struct Records {
    reader: LogReader,
    cancel: CancellationToken,
}

impl Iterator for Records {
    type Item = Result<TransmissionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.is_cancelled() {
            debug!("replay cancelled after {} records", self.reader.records_read);
            return None;
        }
        self.reader.read_next_record().transpose()
    }
}

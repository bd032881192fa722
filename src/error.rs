//! Error types for the capture and replay pipeline.
//!
//! All errors implement [`std::error::Error`] and carry enough context to
//! decide whether a failure is local to one packet or record, or fatal to the
//! session that produced it.
//!
//! ## Error Categories
//!
//! - **Wire errors**: a received datagram too short to decode (`MalformedFrame`)
//! - **Codec errors**: end of a log stream (`EndOfStream`) vs structurally
//!   damaged data (`CorruptRecord`)
//! - **I/O errors**: failures from the underlying file (`Io`)
//! - **Lifecycle errors**: start/stop misuse (`AlreadyRecording`, `NotRecording`)
//! - **Session errors**: unrecoverable mid-session loss (`RecordingAborted`)
//!
//! The split between `EndOfStream` and `CorruptRecord` is load-bearing:
//! replay consumers treat the former as normal termination and the latter as
//! a damaged tail that ended the sequence early.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for capture and replay operations.
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

/// Main error type for capture, persistence and replay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("malformed wire frame: need {needed} bytes, have {available}")]
    MalformedFrame { needed: usize, available: usize },

    #[error("end of record stream")]
    EndOfStream,

    #[error("corrupt record in {context}: {details}")]
    CorruptRecord { context: String, details: String },

    #[error("I/O failure on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("no recording session is active")]
    NotRecording,

    #[error("recording aborted: {reason}")]
    RecordingAborted {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("configuration error in {path}: {details}")]
    Config { path: PathBuf, details: String },
}

impl CaptureError {
    /// Returns whether this error ends the session that produced it.
    ///
    /// Non-fatal errors are recovered locally: a malformed frame is dropped,
    /// a per-record write failure is logged and the writer moves on, and
    /// `EndOfStream` is the normal way a replay finishes.
    pub fn is_fatal(&self) -> bool {
        match self {
            CaptureError::MalformedFrame { .. } => false,
            CaptureError::EndOfStream => false,
            CaptureError::CorruptRecord { .. } => false,
            CaptureError::Io { .. } => false,
            CaptureError::AlreadyRecording => false,
            CaptureError::NotRecording => false,
            CaptureError::RecordingAborted { .. } => true,
            CaptureError::Config { .. } => true,
        }
    }

    /// Helper constructor for I/O errors with path context.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Io { path: path.into(), source }
    }

    /// Helper constructor for corrupt-record errors.
    pub fn corrupt_record(context: impl Into<String>, details: impl Into<String>) -> Self {
        CaptureError::CorruptRecord { context: context.into(), details: details.into() }
    }

    /// Helper constructor for session aborts without an underlying cause.
    pub fn aborted(reason: impl Into<String>) -> Self {
        CaptureError::RecordingAborted { reason: reason.into(), source: None }
    }

    /// Helper constructor for session aborts caused by an underlying error.
    pub fn aborted_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        CaptureError::RecordingAborted { reason: reason.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_contain_their_context(
                context in "\\w+",
                details in "[ -~]*",
                reason in "[ -~]*",
                needed in 1usize..4096usize,
                available in 0usize..4096usize,
            ) {
                let corrupt = CaptureError::corrupt_record(context.clone(), details.clone());
                let msg = corrupt.to_string();
                prop_assert!(msg.contains(&context));
                prop_assert!(msg.contains(&details));

                let malformed = CaptureError::MalformedFrame { needed, available };
                let msg = malformed.to_string();
                prop_assert!(msg.contains(&needed.to_string()));
                prop_assert!(msg.contains(&available.to_string()));

                let aborted = CaptureError::aborted(reason.clone());
                prop_assert!(aborted.to_string().contains(&reason));
            }

            #[test]
            fn io_conversion_preserves_source_message(reason in "[ -~]*") {
                let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, reason.clone());
                let converted: CaptureError = io_err.into();
                match converted {
                    CaptureError::Io { source, .. } => {
                        prop_assert_eq!(source.to_string(), reason);
                    }
                    _ => prop_assert!(false, "expected Io variant from io::Error conversion"),
                }
            }

            #[test]
            fn abort_source_chain_is_traversable(base_message in "[ -~]*") {
                let base: Box<dyn std::error::Error + Send + Sync> =
                    Box::new(std::io::Error::other(base_message.clone()));
                let aborted = CaptureError::aborted_with_source("file handle lost", base);

                let source = std::error::Error::source(&aborted)
                    .expect("abort with source should expose it");
                prop_assert!(source.to_string().contains(&base_message));
            }
        }
    }

    #[test]
    fn fatality_classification() {
        assert!(!CaptureError::MalformedFrame { needed: 55, available: 5 }.is_fatal());
        assert!(!CaptureError::EndOfStream.is_fatal());
        assert!(!CaptureError::corrupt_record("replay", "negative length").is_fatal());
        assert!(!CaptureError::AlreadyRecording.is_fatal());
        assert!(!CaptureError::NotRecording.is_fatal());
        assert!(CaptureError::aborted("handle lost").is_fatal());
    }

    #[test]
    fn error_traits_validation() {
        // Compile-time check: CaptureError must be Send + Sync + 'static
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<CaptureError>();

        let error = CaptureError::io_error(
            PathBuf::from("/tmp/session.vxl"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let _: &dyn std::error::Error = &error;
        assert!(matches!(error, CaptureError::Io { .. }));
    }
}

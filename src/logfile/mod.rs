//! Persisted transmission log: binary record codec and sequential reader.
//!
//! A log file is nothing but encoded records back to back. There is no file
//! header, footer, index or checksum; the format is read front to back.

pub mod codec;
pub mod reader;

pub use reader::LogReader;

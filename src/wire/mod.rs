//! Wire-format decoding for received voice packets.

pub mod decoder;
pub mod format;

pub use decoder::FrameDecoder;

//! Packet-reception boundary.

use tokio::sync::mpsc;

use crate::Result;

/// Trait for sources of raw voice datagrams.
///
/// Sources abstract over wherever packets come from (a UDP voice handler, a
/// test harness, a pcap replay) and handle their own waiting internally. The
/// capture pipeline pulls from a source and never blocks it back.
#[async_trait::async_trait]
pub trait PacketSource: Send + 'static {
    /// Get the next raw packet buffer.
    ///
    /// Returns:
    /// - `Ok(Some(buf))` - a packet arrived
    /// - `Ok(None)` - the source ended (normal termination)
    /// - `Err(e)` - source failure
    async fn next_packet(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Packet source fed through an in-process channel.
///
/// The transport layer (or a test) pushes raw buffers into the sender half;
/// the capture pipeline consumes the receiver half. Dropping the sender ends
/// the source cleanly.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    pub fn new() -> (mpsc::UnboundedSender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait::async_trait]
impl PacketSource for ChannelSource {
    async fn next_packet(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}

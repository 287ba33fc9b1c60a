//! Packet source trait

use crate::Result;

/// Source of raw telemetry datagrams
///
/// Sources abstract over the transport (UDP socket, in-memory channel,
/// recorded capture) and handle their own waiting. The receive loop only
/// ever asks for the next datagram.
#[async_trait::async_trait]
pub trait PacketSource: Send + 'static {
    /// Wait for the next datagram
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - Datagram received (any length, unvalidated)
    /// - `Ok(None)` - Source exhausted (normal termination)
    /// - `Err(e)` - Unrecoverable transport failure; the session ends
    ///
    /// Must be cancel-safe: the loop drops this future when the session is
    /// stopped or a snapshot is requested.
    async fn next_packet(&mut self) -> Result<Option<Vec<u8>>>;

    /// Human-readable description for logs and status, e.g. `udp://0.0.0.0:5300`
    fn describe(&self) -> String;
}

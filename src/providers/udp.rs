//! UDP packet source

use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::provider::PacketSource;
use crate::{Result, TelemetryError};

/// Datagram source bound to a local UDP port.
///
/// The socket is closed when the source is dropped.
#[derive(Debug)]
pub struct UdpSource {
    socket: UdpSocket,
    local_addr: SocketAddr,
    buffer: Vec<u8>,
}

impl UdpSource {
    /// Bind `addr` and allocate a receive buffer of `buffer_size` bytes.
    ///
    /// Datagrams longer than the buffer are truncated by the OS and will fail
    /// decoding downstream.
    pub async fn bind(addr: SocketAddr, buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TelemetryError::socket(format!("bind {addr}"), e))?;
        let local_addr =
            socket.local_addr().map_err(|e| TelemetryError::socket("query local address", e))?;

        info!(%local_addr, buffer_size, "UDP source listening");
        Ok(Self { socket, local_addr, buffer: vec![0u8; buffer_size] })
    }

    /// Address actually bound (resolves port 0 to the assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Receive errors that do not invalidate the socket.
///
/// Windows reports an ICMP port-unreachable from a previous send as
/// `ConnectionReset` on the next receive.
fn is_transient(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::ConnectionReset | ErrorKind::Interrupted | ErrorKind::WouldBlock)
}

#[async_trait::async_trait]
impl PacketSource for UdpSource {
    async fn next_packet(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.socket.recv_from(&mut self.buffer).await {
                Ok((len, peer)) => {
                    debug!(%peer, len, "Datagram received");
                    return Ok(Some(self.buffer[..len].to_vec()));
                }
                Err(e) if is_transient(e.kind()) => {
                    warn!(error = %e, "Transient UDP receive error, continuing");
                }
                Err(e) => return Err(TelemetryError::socket("receive", e)),
            }
        }
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PACKET_LEN;

    #[tokio::test]
    async fn receives_datagrams_on_an_ephemeral_port() {
        let mut source = UdpSource::bind("127.0.0.1:0".parse().unwrap(), 1024).await.unwrap();
        let target = source.local_addr();
        assert_ne!(target.port(), 0);
        assert_eq!(source.describe(), format!("udp://{target}"));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[7u8; PACKET_LEN], target).await.unwrap();
        sender.send_to(&[1u8; 12], target).await.unwrap();

        assert_eq!(source.next_packet().await.unwrap(), Some(vec![7u8; PACKET_LEN]));
        assert_eq!(source.next_packet().await.unwrap(), Some(vec![1u8; 12]));
    }

    #[tokio::test]
    async fn bind_conflict_is_a_socket_error() {
        let first = UdpSource::bind("127.0.0.1:0".parse().unwrap(), 1024).await.unwrap();
        let error = UdpSource::bind(first.local_addr(), 1024).await.unwrap_err();
        assert!(matches!(error, TelemetryError::Socket { .. }));
        assert!(error.to_string().contains("bind"));
    }

    #[test]
    fn transient_kinds() {
        assert!(is_transient(ErrorKind::ConnectionReset));
        assert!(is_transient(ErrorKind::Interrupted));
        assert!(!is_transient(ErrorKind::PermissionDenied));
    }
}

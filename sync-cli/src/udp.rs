//! UDP broadcast emulation of the radio link.
//!
//! Every frame travels in one datagram sent to the configured broadcast
//! address, prefixed with the link-layer addresses:
//!
//! ```text
//! [dst: 6][src: 6][frame]
//! ```
//!
//! Receivers drop their own datagrams and unicast frames addressed to
//! someone else, so a LAN behaves like a shared radio channel.
//!
//! Sends go through a non-blocking std handle to the same socket, so a
//! frame queued right after bind is not refused while the reactor has yet
//! to report the socket writable.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use sync_engine::{PeerList, Transport, TransportError};
use sync_types::{MacAddress, MAX_FRAME_LEN};
use tokio::net::UdpSocket;
use tracing::trace;

const ADDRESS_LEN: usize = MacAddress::LEN;
const DATAGRAM_HEADER_LEN: usize = 2 * ADDRESS_LEN;

/// Prefix `frame` with destination and source addresses.
pub fn encode_datagram(dst: MacAddress, src: MacAddress, frame: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(DATAGRAM_HEADER_LEN + frame.len());
    buf.extend_from_slice(dst.as_bytes());
    buf.extend_from_slice(src.as_bytes());
    buf.extend_from_slice(frame);
    buf
}

/// Split a datagram into destination, source and frame bytes.
pub fn decode_datagram(buf: &[u8]) -> Option<(MacAddress, MacAddress, &[u8])> {
    if buf.len() < DATAGRAM_HEADER_LEN {
        return None;
    }
    let dst = MacAddress::from_bytes(&buf[..ADDRESS_LEN])?;
    let src = MacAddress::from_bytes(&buf[ADDRESS_LEN..DATAGRAM_HEADER_LEN])?;
    Some((dst, src, &buf[DATAGRAM_HEADER_LEN..]))
}

/// Radio emulation over a broadcast-enabled UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    address: MacAddress,
    socket: UdpSocket,
    sender: std::net::UdpSocket,
    target: SocketAddr,
    peers: PeerList,
}

impl UdpTransport {
    /// Bind `bind_address` and send every frame to `target`.
    pub async fn bind(address: MacAddress, bind_address: &str, target: &str) -> Result<Self> {
        let target: SocketAddr = target
            .parse()
            .with_context(|| format!("Invalid broadcast address {:?}", target))?;
        let socket = std::net::UdpSocket::bind(bind_address)
            .with_context(|| format!("Failed to bind {}", bind_address))?;
        socket
            .set_broadcast(true)
            .context("Failed to enable broadcast")?;
        socket
            .set_nonblocking(true)
            .context("Failed to make socket non-blocking")?;
        let sender = socket.try_clone().context("Failed to clone socket")?;
        let socket = UdpSocket::from_std(socket).context("Failed to register socket")?;
        Ok(Self {
            address,
            socket,
            sender,
            target,
            peers: PeerList::new(),
        })
    }

    /// The socket's bound address.
    pub fn socket_address(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to read socket address")
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn send(&self, dest: MacAddress, frame: &[u8]) -> Result<(), TransportError> {
        self.peers.check_dest(dest)?;
        let datagram = encode_datagram(dest, self.address, frame);
        self.sender
            .send_to(&datagram, self.target)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(())
    }

    fn register_peer(&self, address: MacAddress) -> Result<(), TransportError> {
        self.peers.register(address)
    }

    fn deregister_peer(&self, address: MacAddress) -> Result<(), TransportError> {
        self.peers.deregister(address)
    }

    fn is_registered(&self, address: &MacAddress) -> bool {
        self.peers.contains(address)
    }

    async fn recv(&self) -> Result<(MacAddress, Vec<u8>), TransportError> {
        let mut buf = [0u8; DATAGRAM_HEADER_LEN + MAX_FRAME_LEN];
        loop {
            let (len, origin) = self
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
            let Some((dst, src, frame)) = decode_datagram(&buf[..len]) else {
                trace!(%origin, len, "runt datagram");
                continue;
            };
            if src == self.address {
                continue;
            }
            if !dst.is_broadcast() && dst != self.address {
                trace!(%src, %dst, "frame for another station");
                continue;
            }
            return Ok((src, frame.to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> MacAddress {
        MacAddress::new([0x02, 0, 0, 0, 0, n])
    }

    #[test]
    fn datagram_layout() {
        let datagram = encode_datagram(MacAddress::BROADCAST, addr(1), &[0x4E, 0x50]);
        assert_eq!(
            datagram,
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02, 0, 0, 0, 0, 1, 0x4E, 0x50]
        );

        let (dst, src, frame) = decode_datagram(&datagram).unwrap();
        assert!(dst.is_broadcast());
        assert_eq!(src, addr(1));
        assert_eq!(frame, &[0x4E, 0x50]);
    }

    #[test]
    fn short_datagram_is_rejected() {
        assert!(decode_datagram(&[0u8; 11]).is_none());
    }

    /// Two transports on loopback, each aimed at the other.
    async fn linked() -> (UdpTransport, UdpTransport) {
        let a = UdpTransport::bind(addr(1), "127.0.0.1:0", "127.0.0.1:9")
            .await
            .unwrap();
        let b_target = a.socket_address().unwrap().to_string();
        let b = UdpTransport::bind(addr(2), "127.0.0.1:0", &b_target)
            .await
            .unwrap();
        let a_target = b.socket_address().unwrap();
        let a = UdpTransport { target: a_target, ..a };
        (a, b)
    }

    #[tokio::test]
    async fn first_send_after_bind_is_delivered() {
        let b = UdpTransport::bind(addr(2), "127.0.0.1:0", "127.0.0.1:9")
            .await
            .unwrap();
        let target = b.socket_address().unwrap().to_string();
        let a = UdpTransport::bind(addr(1), "127.0.0.1:0", &target)
            .await
            .unwrap();

        a.send(MacAddress::BROADCAST, b"first").unwrap();
        assert_eq!(b.recv().await.unwrap(), (addr(1), b"first".to_vec()));
    }

    #[tokio::test]
    async fn broadcast_reaches_peer() {
        let (a, b) = linked().await;
        a.send(MacAddress::BROADCAST, b"hello").unwrap();
        assert_eq!(b.recv().await.unwrap(), (addr(1), b"hello".to_vec()));
    }

    #[tokio::test]
    async fn unicast_for_other_station_is_skipped() {
        let (a, b) = linked().await;
        a.register_peer(addr(9)).unwrap();
        a.send(addr(9), b"not yours").unwrap();
        a.send(MacAddress::BROADCAST, b"yours").unwrap();
        assert_eq!(b.recv().await.unwrap(), (addr(1), b"yours".to_vec()));
    }

    #[tokio::test]
    async fn unicast_requires_registration() {
        let (a, b) = linked().await;
        assert_eq!(
            a.send(addr(2), b"x"),
            Err(TransportError::UnknownPeer(addr(2)))
        );
        a.register_peer(addr(2)).unwrap();
        a.send(addr(2), b"x").unwrap();
        assert_eq!(b.recv().await.unwrap(), (addr(1), b"x".to_vec()));
    }
}

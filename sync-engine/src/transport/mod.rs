//! Transport abstraction for nebula-sync.
//!
//! This module provides a pluggable link layer that abstracts the
//! connectionless radio (ESP-NOW on hardware, in-memory or UDP on a host).
//!
//! # Design
//!
//! The transport is datagram-oriented and addressed by [`MacAddress`]:
//! - `send()` transmits one frame, fire-and-forget, never blocking
//! - `recv()` yields the next `(source, frame)` pair
//! - unicast requires the destination to be registered first, as on the
//!   real radio; broadcast is always allowed
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new(local);
//! transport.register_peer(peer)?;
//! transport.send(peer, &frame_bytes)?;
//! let (from, bytes) = transport.recv().await?;
//! ```

mod memory;
mod mock;

pub use memory::{MemoryRadio, MemoryTransport};
pub use mock::MockTransport;

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use sync_types::MacAddress;
use thiserror::Error;

/// Unicast peer slots offered by the radio.
pub const MAX_REGISTERED_PEERS: usize = 20;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Unicast to an address that was never registered.
    #[error("unknown peer {0}")]
    UnknownPeer(MacAddress),

    /// The radio's peer list is full.
    #[error("peer table full ({0} peers)")]
    PeerTableFull(usize),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The link was shut down.
    #[error("transport closed")]
    Closed,
}

/// Link-layer transport for sync frames.
///
/// Implementations handle the underlying radio (ESP-NOW, UDP, memory).
#[async_trait]
pub trait Transport: Send + Sync {
    /// This device's address on the link.
    fn local_address(&self) -> MacAddress;

    /// Send one frame to `dest` (or [`MacAddress::BROADCAST`]).
    ///
    /// Must not block. Delivery is best effort.
    fn send(&self, dest: MacAddress, frame: &[u8]) -> Result<(), TransportError>;

    /// Allow unicast to `address`.
    fn register_peer(&self, address: MacAddress) -> Result<(), TransportError>;

    /// Stop unicast to `address`.
    fn deregister_peer(&self, address: MacAddress) -> Result<(), TransportError>;

    /// Whether `address` is registered for unicast.
    fn is_registered(&self, address: &MacAddress) -> bool;

    /// Receive the next frame and its source address.
    ///
    /// Waits until a frame arrives or the link closes.
    async fn recv(&self) -> Result<(MacAddress, Vec<u8>), TransportError>;
}

/// The radio's unicast peer list, bounded by [`MAX_REGISTERED_PEERS`].
///
/// Shared by transport implementations to enforce the same rules as the
/// real radio.
#[derive(Debug, Default)]
pub struct PeerList {
    peers: Mutex<Vec<MacAddress>>,
}

impl PeerList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MacAddress>> {
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add `address`. Registering twice is not an error.
    pub fn register(&self, address: MacAddress) -> Result<(), TransportError> {
        let mut peers = self.lock();
        if peers.contains(&address) {
            return Ok(());
        }
        if peers.len() >= MAX_REGISTERED_PEERS {
            return Err(TransportError::PeerTableFull(MAX_REGISTERED_PEERS));
        }
        peers.push(address);
        Ok(())
    }

    /// Remove `address`.
    pub fn deregister(&self, address: MacAddress) -> Result<(), TransportError> {
        let mut peers = self.lock();
        let before = peers.len();
        peers.retain(|a| *a != address);
        if peers.len() == before {
            return Err(TransportError::UnknownPeer(address));
        }
        Ok(())
    }

    /// Whether `address` is registered.
    pub fn contains(&self, address: &MacAddress) -> bool {
        self.lock().contains(address)
    }

    /// Check that a frame may be sent to `dest`.
    pub fn check_dest(&self, dest: MacAddress) -> Result<(), TransportError> {
        if dest.is_broadcast() || self.contains(&dest) {
            Ok(())
        } else {
            Err(TransportError::UnknownPeer(dest))
        }
    }

    /// Registered addresses in registration order.
    pub fn to_vec(&self) -> Vec<MacAddress> {
        self.lock().clone()
    }
}

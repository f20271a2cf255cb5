//! In-process radio for simulations and multi-device tests.
//!
//! A [`MemoryRadio`] is a shared medium. Each attached
//! [`MemoryTransport`] gets its own inbound channel; broadcast frames are
//! copied to every other attached device and unicast frames go to the
//! destination only. A device can be silenced to emulate it going out of
//! range.

use super::{PeerList, Transport, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use sync_types::MacAddress;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

type Datagram = (MacAddress, Vec<u8>);

/// Shared in-memory medium.
#[derive(Debug, Clone, Default)]
pub struct MemoryRadio {
    inner: Arc<Mutex<RadioInner>>,
}

#[derive(Debug, Default)]
struct RadioInner {
    stations: HashMap<MacAddress, UnboundedSender<Datagram>>,
    silenced: HashSet<MacAddress>,
}

impl MemoryRadio {
    /// Create an empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RadioInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach a device. Re-attaching an address replaces its channel.
    pub fn attach(&self, address: MacAddress) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().stations.insert(address, tx);
        MemoryTransport {
            address,
            radio: self.clone(),
            peers: PeerList::new(),
            inbox: tokio::sync::Mutex::new(rx),
        }
    }

    /// Drop every frame to or from `address` until restored.
    pub fn silence(&self, address: MacAddress) {
        self.lock().silenced.insert(address);
    }

    /// Undo [`silence`](Self::silence).
    pub fn restore(&self, address: MacAddress) {
        self.lock().silenced.remove(&address);
    }

    /// Number of attached devices.
    pub fn station_count(&self) -> usize {
        self.lock().stations.len()
    }

    fn transmit(&self, from: MacAddress, dest: MacAddress, frame: &[u8]) {
        let inner = self.lock();
        if inner.silenced.contains(&from) {
            trace!(%from, "sender silenced, frame lost");
            return;
        }
        for (address, tx) in &inner.stations {
            let addressed = dest.is_broadcast() || *address == dest;
            if *address == from || !addressed || inner.silenced.contains(address) {
                continue;
            }
            // A closed inbox is a device that went away; the frame is lost
            let _ = tx.send((from, frame.to_vec()));
        }
    }
}

/// One device's view of a [`MemoryRadio`].
#[derive(Debug)]
pub struct MemoryTransport {
    address: MacAddress,
    radio: MemoryRadio,
    peers: PeerList,
    inbox: tokio::sync::Mutex<UnboundedReceiver<Datagram>>,
}

impl MemoryTransport {
    /// Take the next pending frame without waiting.
    ///
    /// Returns `None` when the inbox is empty or a `recv()` is in progress.
    pub fn try_recv(&self) -> Option<(MacAddress, Vec<u8>)> {
        self.inbox.try_lock().ok()?.try_recv().ok()
    }

    /// The medium this device is attached to.
    pub fn radio(&self) -> &MemoryRadio {
        &self.radio
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn send(&self, dest: MacAddress, frame: &[u8]) -> Result<(), TransportError> {
        self.peers.check_dest(dest)?;
        self.radio.transmit(self.address, dest, frame);
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
        self.inbox.lock().await.recv().await.ok_or(TransportError::Closed)
    }
}

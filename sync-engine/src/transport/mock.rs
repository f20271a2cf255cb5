//! Mock transport for testing.
//!
//! Allows queueing inbound frames and capturing sent frames for verification.

use super::{PeerList, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use sync_types::{Frame, MacAddress};

/// Mock transport for testing.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Clone)]
pub struct MockTransport {
    address: MacAddress,
    peers: Arc<PeerList>,
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    sent: Vec<(MacAddress, Vec<u8>)>,
    receive_queue: VecDeque<(MacAddress, Vec<u8>)>,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a mock transport for the device at `address`.
    pub fn new(address: MacAddress) -> Self {
        Self {
            address,
            peers: Arc::default(),
            inner: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a frame to be returned by the next `recv()` call.
    pub fn queue_frame(&self, from: MacAddress, data: Vec<u8>) {
        self.lock().receive_queue.push_back((from, data));
    }

    /// Every frame sent so far, raw.
    pub fn sent(&self) -> Vec<(MacAddress, Vec<u8>)> {
        self.lock().sent.clone()
    }

    /// Every frame sent so far, decoded. Undecodable frames are skipped.
    pub fn sent_frames(&self) -> Vec<(MacAddress, Frame)> {
        self.lock()
            .sent
            .iter()
            .filter_map(|(to, bytes)| Frame::from_bytes(bytes).ok().map(|f| (*to, f)))
            .collect()
    }

    /// Forget sent frames.
    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    /// Addresses currently registered for unicast.
    pub fn registered(&self) -> Vec<MacAddress> {
        self.peers.to_vec()
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn send(&self, dest: MacAddress, frame: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }
        self.peers.check_dest(dest)?;

        inner.sent.push((dest, frame.to_vec()));
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
        self.lock()
            .receive_queue
            .pop_front()
            .ok_or(TransportError::Closed)
    }
}

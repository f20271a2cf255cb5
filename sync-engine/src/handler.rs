//! Application callbacks.

use sync_core::PeerSnapshot;
use sync_types::{MacAddress, PatternPayload};

/// Callbacks into the rendering and control layers.
///
/// Every method has a no-op default so implementors only override what
/// they use. Callbacks run on the caller's thread after the protocol lock
/// is released, so they may call back into the engine.
#[allow(unused_variables)]
pub trait SyncHandler: Send + Sync {
    /// A paired peer changed our display mode.
    fn on_mode_change(&self, mode: u8, index: u8) {}

    /// A paired peer sent a procedural pattern.
    fn on_pattern(&self, pattern: &PatternPayload) {}

    /// A paired peer changed our brightness.
    fn on_brightness(&self, level: u8) {}

    /// A paired peer changed our frame delay (ms).
    fn on_frame_rate(&self, delay: u8) {}

    /// New clock offset estimate (ms, positive when the peer is ahead).
    fn on_sync_time(&self, offset_ms: i32) {}

    /// A peer was paired or went online or offline.
    fn on_peer_update(&self, peer: &PeerSnapshot) {}

    /// A peer entry was removed.
    fn on_peer_removed(&self, address: MacAddress) {}
}

/// Handler that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl SyncHandler for NoopHandler {}

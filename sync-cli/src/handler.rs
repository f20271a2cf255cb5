//! Callback handler standing in for the LED renderer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use sync_core::{LocalState, PeerSnapshot};
use sync_engine::SyncHandler;
use sync_types::{MacAddress, PatternPayload};
use tracing::info;

/// Logs every callback and applies remote changes to a display state.
#[derive(Debug)]
pub struct DisplayHandler {
    name: String,
    display: Mutex<LocalState>,
    events: AtomicU64,
}

impl DisplayHandler {
    /// Create a handler for the device called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display: Mutex::new(LocalState::default()),
            events: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.display.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn count(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    /// What the renderer is currently showing.
    pub fn display(&self) -> LocalState {
        *self.lock()
    }

    /// Apply a local change (made on this device, not received).
    pub fn set_display(&self, state: LocalState) {
        *self.lock() = state;
    }

    /// Callbacks received so far.
    pub fn event_count(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

impl SyncHandler for DisplayHandler {
    fn on_mode_change(&self, mode: u8, index: u8) {
        self.count();
        let mut display = self.lock();
        display.mode = mode;
        display.index = index;
        info!(device = %self.name, mode, index, "mode changed by peer");
    }

    fn on_pattern(&self, pattern: &PatternPayload) {
        self.count();
        info!(
            device = %self.name,
            index = pattern.index,
            pattern_type = pattern.pattern_type,
            speed = pattern.speed,
            "pattern received"
        );
    }

    fn on_brightness(&self, level: u8) {
        self.count();
        self.lock().brightness = level;
        info!(device = %self.name, level, "brightness changed by peer");
    }

    fn on_frame_rate(&self, delay: u8) {
        self.count();
        self.lock().frame_delay = delay;
        info!(device = %self.name, delay, "frame delay changed by peer");
    }

    fn on_sync_time(&self, offset_ms: i32) {
        self.count();
        tracing::debug!(device = %self.name, offset_ms, "clock offset updated");
    }

    fn on_peer_update(&self, peer: &PeerSnapshot) {
        self.count();
        info!(
            device = %self.name,
            slot = peer.index,
            peer = %peer.peer.address,
            name = %peer.peer.name,
            state = ?peer.peer.state,
            online = peer.peer.online,
            "peer update"
        );
    }

    fn on_peer_removed(&self, address: MacAddress) {
        self.count();
        info!(device = %self.name, peer = %address, "peer removed");
    }
}

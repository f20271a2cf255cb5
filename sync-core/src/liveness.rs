//! Heartbeats and online/offline tracking.
//!
//! A peer is online while a valid frame from it arrived within the
//! liveness timeout. The flag is refreshed on every inbound frame and
//! recomputed for every entry on each tick. Paired peers report both
//! edges to the application exactly once.

use sync_types::{HeartbeatPayload, MacAddress, Message};
use tracing::{debug, info};

use crate::{Action, PeerState, SyncEvent, SyncProtocol};

impl SyncProtocol {
    pub(crate) fn heartbeat_due(&self, now: u64) -> bool {
        self.last_heartbeat
            .map_or(true, |last| now.saturating_sub(last) >= self.config.heartbeat_interval_ms)
    }

    pub(crate) fn heartbeat_message(&self, now: u64) -> Message {
        Message::Heartbeat(HeartbeatPayload {
            mode: self.local.mode,
            index: self.local.index,
            brightness: self.local.brightness,
            frame_delay: self.local.frame_delay,
            uptime_ms: now as u32,
            sync_mode: Some(self.sync_mode),
            name: self.name.clone(),
        })
    }

    /// Refresh `last_seen` for a known sender.
    pub(crate) fn mark_seen(&mut self, from: &MacAddress, now: u64, actions: &mut Vec<Action>) {
        let Some(index) = self.registry.find(from) else {
            return;
        };
        let Some(peer) = self.registry.get_mut(index) else {
            return;
        };
        peer.last_seen = now;
        if !peer.online {
            peer.online = true;
            if peer.state == PeerState::Paired {
                info!(address = %peer.address, name = %peer.name, "peer back online");
                if let Some(snapshot) = self.registry.snapshot(index) {
                    actions.push(Action::Emit(SyncEvent::PeerUpdate(snapshot)));
                }
            }
        }
    }

    /// Record a heartbeat. Unknown senders get a discovery entry when a
    /// slot is free; heartbeats never pair.
    pub(crate) fn on_heartbeat(&mut self, from: MacAddress, heartbeat: HeartbeatPayload, now: u64) {
        let Some(index) = self
            .registry
            .find_or_insert(from, PeerState::Discovering, now)
        else {
            debug!(%from, name = %heartbeat.name, "peer table full, not tracking heartbeat");
            return;
        };
        if let Some(peer) = self.registry.get_mut(index) {
            peer.name = heartbeat.name;
            peer.current_mode = heartbeat.mode;
            peer.current_index = heartbeat.index;
            peer.brightness = heartbeat.brightness;
            peer.frame_delay = heartbeat.frame_delay;
            peer.sync_mode = heartbeat.sync_mode;
            peer.uptime_ms = Some(heartbeat.uptime_ms);
        }
    }

    /// Recompute `online` for every entry, then evict stale discovery entries.
    pub(crate) fn sweep(&mut self, now: u64, actions: &mut Vec<Action>) {
        let timeout = self.config.liveness_timeout_ms;
        for (index, peer) in self.registry.iter_mut() {
            let online = now.saturating_sub(peer.last_seen) < timeout;
            if online == peer.online {
                continue;
            }
            peer.online = online;
            if peer.state == PeerState::Paired {
                info!(address = %peer.address, name = %peer.name, online, "peer liveness changed");
                actions.push(Action::Emit(SyncEvent::PeerUpdate(crate::PeerSnapshot {
                    index,
                    peer: peer.clone(),
                })));
            }
        }
        self.evict_stale(now, actions);
    }
}

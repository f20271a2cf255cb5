//! Clock broadcast and offset estimation for phase-aligned animation.

use sync_types::{MacAddress, Message, SyncMode};
use tracing::{debug, trace};

use crate::{Action, SyncEvent, SyncProtocol};

/// Offset of a peer's clock relative to ours, in milliseconds.
///
/// Positive when the sender's clock reads ahead. Both clocks wrap at
/// `u32::MAX`, so the difference is taken modulo 2^32.
pub fn clock_offset(sender_clock: u32, local_ms: u64) -> i32 {
    sender_clock.wrapping_sub(local_ms as u32) as i32
}

impl SyncProtocol {
    /// Send our clock to every paired, online peer when in mirror mode.
    pub(crate) fn time_sync(&mut self, now: u64, actions: &mut Vec<Action>) {
        if self.sync_mode != SyncMode::Mirror {
            return;
        }
        let due = self
            .last_time_sync
            .map_or(true, |last| now.saturating_sub(last) >= self.config.time_sync_interval_ms);
        if !due {
            return;
        }
        let targets = self.registry.active_addresses();
        if targets.is_empty() {
            return;
        }
        trace!(peers = targets.len(), clock = now as u32, "sending time sync");
        let message = Message::SyncTime {
            sender_clock: now as u32,
        };
        actions.extend(
            targets
                .into_iter()
                .map(|to| Action::send(to, message.clone())),
        );
        self.last_time_sync = Some(now);
    }

    pub(crate) fn on_sync_time(
        &mut self,
        from: MacAddress,
        sender_clock: u32,
        now: u64,
        actions: &mut Vec<Action>,
    ) {
        let offset = clock_offset(sender_clock, now);
        debug!(%from, offset, "clock offset updated");
        self.time_offset = offset;
        actions.push(Action::Emit(SyncEvent::TimeOffset(offset)));
    }
}

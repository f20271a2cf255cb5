//! Local display state, protocol actions and application events.
//!
//! [`SyncProtocol`](crate::SyncProtocol) never performs I/O. Every entry
//! point returns a list of [`Action`]s which the runtime executes in
//! order: sending frames, maintaining the radio's peer list and invoking
//! application callbacks.

use serde::{Deserialize, Serialize};
use sync_types::{MacAddress, Message, ModePayload, PatternPayload};

use crate::PeerSnapshot;

/// Default brightness reported before the application sets its state.
pub const DEFAULT_BRIGHTNESS: u8 = 128;

/// Default frame delay (ms) reported before the application sets its state.
pub const DEFAULT_FRAME_DELAY: u8 = 20;

/// Display state owned by this device, mirrored into every heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    /// Current display mode
    pub mode: u8,
    /// Index within the mode (pattern or image slot)
    pub index: u8,
    /// LED brightness
    pub brightness: u8,
    /// Delay between animation frames (ms)
    pub frame_delay: u8,
}

impl Default for LocalState {
    fn default() -> Self {
        Self {
            mode: 0,
            index: 0,
            brightness: DEFAULT_BRIGHTNESS,
            frame_delay: DEFAULT_FRAME_DELAY,
        }
    }
}

/// Side effects requested by the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Transmit a message (to a peer or to [`MacAddress::BROADCAST`]).
    Send {
        /// Destination address
        to: MacAddress,
        /// Message to frame and send
        message: Message,
    },
    /// Add an address to the radio's unicast peer list.
    RegisterPeer(MacAddress),
    /// Remove an address from the radio's unicast peer list.
    DeregisterPeer(MacAddress),
    /// Deliver an event to the application.
    Emit(SyncEvent),
}

impl Action {
    pub(crate) fn send(to: MacAddress, message: Message) -> Self {
        Action::Send { to, message }
    }
}

/// Events delivered to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A paired peer changed our display mode.
    ModeChange(ModePayload),
    /// A paired peer sent a pattern.
    Pattern(PatternPayload),
    /// A paired peer changed our brightness.
    Brightness(u8),
    /// A paired peer changed our frame delay.
    FrameRate(u8),
    /// New clock offset estimate (ms, positive when the peer is ahead).
    TimeOffset(i32),
    /// A peer changed state (paired, online or offline).
    PeerUpdate(PeerSnapshot),
    /// A peer entry was removed by unpairing or eviction.
    PeerRemoved(MacAddress),
}

impl SyncEvent {
    /// Whether this event applies a remote command to the local display.
    ///
    /// The runtime delivers these inside a re-entrancy guard so that the
    /// resulting local state change is not mirrored back out.
    pub fn is_remote_command(&self) -> bool {
        matches!(
            self,
            SyncEvent::ModeChange(_)
                | SyncEvent::Pattern(_)
                | SyncEvent::Brightness(_)
                | SyncEvent::FrameRate(_)
        )
    }
}

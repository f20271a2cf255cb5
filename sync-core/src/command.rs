//! Display commands: mirror broadcast, per-peer unicast and receipt.

use sync_types::{Message, ModePayload, PatternPayload, SyncMode};
use tracing::debug;

use crate::{Action, PeerIndex, PeerState, SyncEvent, SyncProtocol};

/// A display change that can be sent to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch display mode and index
    Mode(ModePayload),
    /// Load a procedural pattern
    Pattern(PatternPayload),
    /// Set LED brightness
    Brightness(u8),
    /// Set delay between animation frames (ms)
    FrameRate(u8),
}

impl Command {
    /// Wire message carrying this command.
    pub fn into_message(self) -> Message {
        match self {
            Command::Mode(payload) => Message::SetMode(payload),
            Command::Pattern(payload) => Message::SetPattern(payload),
            Command::Brightness(brightness) => Message::SetBrightness { brightness },
            Command::FrameRate(frame_delay) => Message::SetFrameRate { frame_delay },
        }
    }

    /// Command carried by a message, if it is one.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::SetMode(payload) => Some(Command::Mode(payload)),
            Message::SetPattern(payload) => Some(Command::Pattern(payload)),
            Message::SetBrightness { brightness } => Some(Command::Brightness(brightness)),
            Message::SetFrameRate { frame_delay } => Some(Command::FrameRate(frame_delay)),
            _ => None,
        }
    }

    /// Application event delivering this command locally.
    pub fn into_event(self) -> SyncEvent {
        match self {
            Command::Mode(payload) => SyncEvent::ModeChange(payload),
            Command::Pattern(payload) => SyncEvent::Pattern(payload),
            Command::Brightness(level) => SyncEvent::Brightness(level),
            Command::FrameRate(delay) => SyncEvent::FrameRate(delay),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Command::Mode(_) => "mode",
            Command::Pattern(_) => "pattern",
            Command::Brightness(_) => "brightness",
            Command::FrameRate(_) => "frame rate",
        }
    }
}

impl SyncProtocol {
    /// Send a local change to every paired, online peer.
    ///
    /// No-op unless in mirror mode with at least one such peer.
    pub fn mirror_command(&self, command: Command) -> Vec<Action> {
        if self.sync_mode != SyncMode::Mirror {
            debug!(command = command.label(), "independent mode, not mirroring");
            return Vec::new();
        }
        let targets = self.registry.active_addresses();
        if targets.is_empty() {
            debug!(command = command.label(), "no online paired peers, not mirroring");
            return Vec::new();
        }
        let message = command.into_message();
        targets
            .into_iter()
            .map(|to| Action::send(to, message.clone()))
            .collect()
    }

    /// Send a command to the paired peer in slot `index`, whatever the
    /// sync mode.
    pub fn peer_command(&self, index: PeerIndex, command: Command) -> Vec<Action> {
        match self.registry.get(index) {
            Some(peer) if peer.state == PeerState::Paired => {
                vec![Action::send(peer.address, command.into_message())]
            }
            _ => {
                debug!(index, command = command.label(), "no paired peer in slot");
                Vec::new()
            }
        }
    }

    /// Apply a command from the paired peer in slot `index`.
    pub(crate) fn on_command(&mut self, index: PeerIndex, command: Command, actions: &mut Vec<Action>) {
        if let Some(peer) = self.registry.get_mut(index) {
            match command {
                Command::Mode(payload) => {
                    peer.current_mode = payload.mode;
                    peer.current_index = payload.index;
                }
                Command::Brightness(level) => peer.brightness = level,
                Command::FrameRate(delay) => peer.frame_delay = delay,
                Command::Pattern(_) => {}
            }
        }
        actions.push(Action::Emit(command.into_event()));
    }
}

//! The protocol state machine and inbound message dispatcher.

use sync_types::{MacAddress, Message, SyncMode};
use tracing::{debug, info, trace};

use crate::command::Command;
use crate::{Action, LocalState, PeerIndex, PeerRegistry, PeerSnapshot, PeerState, ProtocolConfig};

/// Peer synchronization protocol for one device.
///
/// Owns the peer table, the local display state and the protocol timers.
/// All methods are synchronous and side-effect free: callers pass the
/// current monotonic time in milliseconds and execute the returned
/// [`Action`]s.
#[derive(Debug, Clone)]
pub struct SyncProtocol {
    pub(crate) config: ProtocolConfig,
    pub(crate) address: MacAddress,
    pub(crate) name: String,
    pub(crate) registry: PeerRegistry,
    pub(crate) sync_mode: SyncMode,
    pub(crate) local: LocalState,
    pub(crate) auto_pair: bool,
    pub(crate) time_offset: i32,
    pub(crate) last_heartbeat: Option<u64>,
    pub(crate) last_time_sync: Option<u64>,
}

impl SyncProtocol {
    /// Create a protocol instance for the device at `address`.
    pub fn new(address: MacAddress, name: impl Into<String>, config: ProtocolConfig) -> Self {
        Self {
            config,
            address,
            name: name.into(),
            registry: PeerRegistry::new(),
            sync_mode: SyncMode::default(),
            local: LocalState::default(),
            auto_pair: true,
            time_offset: 0,
            last_heartbeat: None,
            last_time_sync: None,
        }
    }

    /// This device's radio address.
    pub fn address(&self) -> MacAddress {
        self.address
    }

    /// This device's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the name announced in heartbeats and pair messages.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Protocol timings.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Current sync mode.
    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// Switch between mirror and independent operation.
    pub fn set_sync_mode(&mut self, mode: SyncMode) {
        if mode != self.sync_mode {
            info!(from = %self.sync_mode, to = %mode, "sync mode changed");
            self.sync_mode = mode;
            // Align clocks as soon as mirroring resumes
            self.last_time_sync = None;
        }
    }

    /// The display state mirrored into heartbeats.
    pub fn local_state(&self) -> LocalState {
        self.local
    }

    /// Replace the local display state.
    pub fn set_local_state(&mut self, state: LocalState) {
        self.local = state;
    }

    /// Whether inbound pair requests are accepted.
    pub fn auto_pair(&self) -> bool {
        self.auto_pair
    }

    /// Enable or disable accepting inbound pair requests.
    pub fn set_auto_pair(&mut self, enabled: bool) {
        self.auto_pair = enabled;
    }

    /// Most recent clock offset estimate (ms).
    pub fn time_offset(&self) -> i32 {
        self.time_offset
    }

    /// Number of known peers in any state.
    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    /// Snapshot of the peer in slot `index`.
    pub fn peer(&self, index: PeerIndex) -> Option<PeerSnapshot> {
        self.registry.snapshot(index)
    }

    /// Snapshots of every known peer in slot order.
    pub fn peers(&self) -> Vec<PeerSnapshot> {
        self.registry
            .iter()
            .filter_map(|(index, _)| self.registry.snapshot(index))
            .collect()
    }

    /// Whether at least one peer is paired and online.
    pub fn has_paired_peer(&self) -> bool {
        self.registry.has_active_peer()
    }

    /// Read access to the peer table.
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Route one inbound message.
    ///
    /// `from` is the source address reported by the radio.
    pub fn handle_message(&mut self, from: MacAddress, message: Message, now: u64) -> Vec<Action> {
        if from == self.address {
            debug!(msg_type = ?message.message_type(), "dropping own frame");
            return Vec::new();
        }
        trace!(%from, msg_type = ?message.message_type(), "received");

        let mut actions = Vec::new();
        self.mark_seen(&from, now, &mut actions);

        match message {
            Message::PairRequest(payload) => self.on_pair_request(from, payload, now, &mut actions),
            Message::PairResponse(payload) => {
                self.on_pair_response(from, payload, now, &mut actions)
            }
            Message::Unpair => self.on_unpair(from, &mut actions),
            Message::Heartbeat(payload) => self.on_heartbeat(from, payload, now),
            Message::SyncTime { sender_clock } => {
                if self.paired_sender(&from, "sync time").is_some() {
                    self.on_sync_time(from, sender_clock, now, &mut actions);
                }
            }
            other => {
                if let Some(command) = Command::from_message(other) {
                    if let Some(index) = self.paired_sender(&from, command.label()) {
                        self.on_command(index, command, &mut actions);
                    }
                }
            }
        }
        actions
    }

    /// Main-loop entry point: liveness sweep, eviction, heartbeat and
    /// clock broadcasts.
    pub fn tick(&mut self, now: u64) -> Vec<Action> {
        let mut actions = Vec::new();
        self.sweep(now, &mut actions);
        if self.heartbeat_due(now) {
            actions.push(Action::send(MacAddress::BROADCAST, self.heartbeat_message(now)));
            self.last_heartbeat = Some(now);
        }
        self.time_sync(now, &mut actions);
        actions
    }

    /// Slot of `from` when it is a paired peer.
    fn paired_sender(&self, from: &MacAddress, what: &str) -> Option<PeerIndex> {
        let index = self.registry.find(from)?;
        match self.registry.get(index) {
            Some(peer) if peer.state == PeerState::Paired => Some(index),
            _ => {
                debug!(%from, what, "ignoring message from unpaired sender");
                None
            }
        }
    }
}

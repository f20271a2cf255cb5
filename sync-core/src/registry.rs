//! Fixed-capacity peer table.
//!
//! Peers live in an arena of [`MAX_PEERS`] slots addressed by index. A
//! bitmask tracks free slots, so allocation is O(1) and the capacity bound
//! can never be exceeded. Indexes are stable: removing a peer frees its
//! slot without shifting the others.

use serde::{Deserialize, Serialize};
use sync_types::{MacAddress, SyncMode};

/// Maximum number of simultaneously known peers.
pub const MAX_PEERS: usize = 6;

/// Slot index of a peer in the registry.
pub type PeerIndex = usize;

const ALL_FREE: u32 = (1 << MAX_PEERS) - 1;

/// Pairing state of a known peer.
///
/// A free slot is the "none" state; there is no variant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
    /// Seen on the air (heartbeat), never asked to pair
    Discovering,
    /// We broadcast a pair request while this peer was known
    PairRequestSent,
    /// Pairing handshake completed
    Paired,
}

impl PeerState {
    /// Whether this is an unpaired discovery entry subject to eviction.
    pub fn is_discovery(&self) -> bool {
        matches!(self, PeerState::Discovering | PeerState::PairRequestSent)
    }
}

/// One remote device and its last-known state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Radio address (unique key)
    pub address: MacAddress,
    /// Display name
    pub name: String,
    /// Pairing state
    pub state: PeerState,
    /// Monotonic time (ms) of the last valid frame from this address
    pub last_seen: u64,
    /// `now - last_seen < liveness timeout`, recomputed every tick
    pub online: bool,
    /// When the pair request covering this entry was sent
    pub requested_at: Option<u64>,
    /// Last reported display mode
    pub current_mode: u8,
    /// Last reported index within the mode
    pub current_index: u8,
    /// Last reported brightness
    pub brightness: u8,
    /// Last reported frame delay
    pub frame_delay: u8,
    /// Sync mode from the last heartbeat
    pub sync_mode: Option<SyncMode>,
    /// Uptime from the last heartbeat
    pub uptime_ms: Option<u32>,
}

impl Peer {
    fn new(address: MacAddress, state: PeerState, now: u64) -> Self {
        Self {
            address,
            name: String::new(),
            state,
            last_seen: now,
            online: true,
            requested_at: None,
            current_mode: 0,
            current_index: 0,
            brightness: 0,
            frame_delay: 0,
            sync_mode: None,
            uptime_ms: None,
        }
    }

    /// Paired and online.
    pub fn is_active(&self) -> bool {
        self.state == PeerState::Paired && self.online
    }
}

/// A copy of a peer entry handed to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    /// Registry slot
    pub index: PeerIndex,
    /// Entry contents at the time of the snapshot
    #[serde(flatten)]
    pub peer: Peer,
}

/// Arena of peer slots with explicit free-slot tracking.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    slots: [Option<Peer>; MAX_PEERS],
    /// Bit `i` set means slot `i` is free.
    free: u32,
}

impl PeerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            free: ALL_FREE,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        MAX_PEERS - self.free.count_ones() as usize
    }

    /// Whether no peers are known.
    pub fn is_empty(&self) -> bool {
        self.free == ALL_FREE
    }

    /// Whether every slot is taken.
    pub fn is_full(&self) -> bool {
        self.free == 0
    }

    /// Find the slot holding `address`.
    pub fn find(&self, address: &MacAddress) -> Option<PeerIndex> {
        self.iter()
            .find(|(_, peer)| peer.address == *address)
            .map(|(index, _)| index)
    }

    /// Get the peer in a slot.
    pub fn get(&self, index: PeerIndex) -> Option<&Peer> {
        self.slots.get(index)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: PeerIndex) -> Option<&mut Peer> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Copy a slot for the application.
    pub fn snapshot(&self, index: PeerIndex) -> Option<PeerSnapshot> {
        self.get(index).map(|peer| PeerSnapshot {
            index,
            peer: peer.clone(),
        })
    }

    /// Iterate occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (PeerIndex, &Peer)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|peer| (index, peer)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (PeerIndex, &mut Peer)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|peer| (index, peer)))
    }

    /// Allocate the lowest free slot for a new address.
    ///
    /// Returns `None` when the table is full. The caller must ensure the
    /// address is not already present.
    pub(crate) fn insert(
        &mut self,
        address: MacAddress,
        state: PeerState,
        now: u64,
    ) -> Option<PeerIndex> {
        if self.is_full() {
            return None;
        }
        let index = self.free.trailing_zeros() as usize;
        self.free &= !(1 << index);
        self.slots[index] = Some(Peer::new(address, state, now));
        Some(index)
    }

    /// Existing slot for `address`, or a new one in `state`.
    pub(crate) fn find_or_insert(
        &mut self,
        address: MacAddress,
        state: PeerState,
        now: u64,
    ) -> Option<PeerIndex> {
        self.find(&address)
            .or_else(|| self.insert(address, state, now))
    }

    /// Free a slot, returning its peer.
    pub(crate) fn remove(&mut self, index: PeerIndex) -> Option<Peer> {
        let peer = self.slots.get_mut(index)?.take()?;
        self.free |= 1 << index;
        Some(peer)
    }

    /// Free every slot.
    pub(crate) fn drain(&mut self) -> Vec<(PeerIndex, Peer)> {
        let drained = self
            .slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.take().map(|peer| (index, peer)))
            .collect();
        self.free = ALL_FREE;
        drained
    }

    /// Whether at least one peer is paired and online.
    pub fn has_active_peer(&self) -> bool {
        self.iter().any(|(_, peer)| peer.is_active())
    }

    /// Addresses of every paired, online peer.
    pub fn active_addresses(&self) -> Vec<MacAddress> {
        self.iter()
            .filter(|(_, peer)| peer.is_active())
            .map(|(_, peer)| peer.address)
            .collect()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Pairing handshake, unpairing and discovery eviction.
//!
//! ```text
//! (none) --start_pairing--> PairRequestSent --PairResponse(accepted)--> Paired
//! (none) --PairRequest (auto pair on)-------------------------------> Paired
//! Paired --unpair (either side)--> (none)
//! Discovering / PairRequestSent --discovery timeout--> (none)
//! ```

use sync_types::{MacAddress, Message, PairPayload};
use tracing::{debug, info};

use crate::{Action, Peer, PeerIndex, PeerState, SyncEvent, SyncProtocol};

impl SyncProtocol {
    /// Broadcast a pair request.
    ///
    /// Every entry still in discovery moves to `PairRequestSent` and its
    /// request clock starts now.
    pub fn start_pairing(&mut self, now: u64) -> Vec<Action> {
        for (_, peer) in self.registry.iter_mut() {
            if peer.state.is_discovery() {
                peer.state = PeerState::PairRequestSent;
                peer.requested_at = Some(now);
            }
        }
        info!(name = %self.name, "pairing started");
        vec![Action::send(
            MacAddress::BROADCAST,
            Message::PairRequest(self.pair_payload(false)),
        )]
    }

    /// Unpair the peer in slot `index`, notifying it when paired.
    pub fn unpair_peer(&mut self, index: PeerIndex) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.registry.remove(index) {
            Some(peer) => {
                info!(index, address = %peer.address, "unpairing peer");
                release(peer, true, &mut actions);
            }
            None => debug!(index, "unpair: no peer in slot"),
        }
        actions
    }

    /// Unpair every known peer.
    pub fn unpair_all(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        let drained = self.registry.drain();
        if !drained.is_empty() {
            info!(count = drained.len(), "unpairing all peers");
        }
        for (_, peer) in drained {
            release(peer, true, &mut actions);
        }
        actions
    }

    pub(crate) fn pair_payload(&self, accepted: bool) -> PairPayload {
        PairPayload {
            address: self.address,
            name: self.name.clone(),
            accepted,
        }
    }

    pub(crate) fn on_pair_request(
        &mut self,
        from: MacAddress,
        payload: PairPayload,
        now: u64,
        actions: &mut Vec<Action>,
    ) {
        if !self.auto_pair {
            debug!(%from, "auto pair disabled, ignoring pair request");
            return;
        }
        let Some((index, newly_paired)) = self.promote(from, payload, now, actions) else {
            return;
        };
        // Always answer: the requester may have lost its side of the pairing
        actions.push(Action::send(
            from,
            Message::PairResponse(self.pair_payload(true)),
        ));
        if newly_paired {
            if let Some(snapshot) = self.registry.snapshot(index) {
                actions.push(Action::Emit(SyncEvent::PeerUpdate(snapshot)));
            }
        }
    }

    pub(crate) fn on_pair_response(
        &mut self,
        from: MacAddress,
        payload: PairPayload,
        now: u64,
        actions: &mut Vec<Action>,
    ) {
        if !payload.accepted {
            info!(%from, name = %payload.name, "pair request declined");
            return;
        }
        // An acceptance pairs from any state, including plain discovery
        let Some((index, newly_paired)) = self.promote(from, payload, now, actions) else {
            return;
        };
        if newly_paired {
            if let Some(snapshot) = self.registry.snapshot(index) {
                actions.push(Action::Emit(SyncEvent::PeerUpdate(snapshot)));
            }
        }
    }

    pub(crate) fn on_unpair(&mut self, from: MacAddress, actions: &mut Vec<Action>) {
        let Some(index) = self.registry.find(&from) else {
            debug!(%from, "unpair from unknown address");
            return;
        };
        if let Some(peer) = self.registry.remove(index) {
            info!(%from, name = %peer.name, "peer unpaired us");
            release(peer, false, actions);
        }
    }

    /// Remove discovery entries older than the discovery timeout.
    pub(crate) fn evict_stale(&mut self, now: u64, actions: &mut Vec<Action>) {
        let timeout = self.config.discovery_timeout_ms;
        let stale: Vec<PeerIndex> = self
            .registry
            .iter()
            .filter(|(_, peer)| match peer.state {
                PeerState::Discovering => now.saturating_sub(peer.last_seen) >= timeout,
                PeerState::PairRequestSent => {
                    now.saturating_sub(peer.requested_at.unwrap_or(peer.last_seen)) >= timeout
                }
                PeerState::Paired => false,
            })
            .map(|(index, _)| index)
            .collect();

        for index in stale {
            if let Some(peer) = self.registry.remove(index) {
                debug!(address = %peer.address, state = ?peer.state, "evicting stale discovery entry");
                actions.push(Action::Emit(SyncEvent::PeerRemoved(peer.address)));
            }
        }
    }

    /// Move `from` to `Paired`, creating the entry if needed.
    ///
    /// Returns the slot and whether the peer was newly paired, or `None`
    /// when the table is full.
    fn promote(
        &mut self,
        from: MacAddress,
        payload: PairPayload,
        now: u64,
        actions: &mut Vec<Action>,
    ) -> Option<(PeerIndex, bool)> {
        if payload.address != from {
            debug!(%from, claimed = %payload.address, "pair payload address differs from source");
        }
        let Some(index) = self
            .registry
            .find_or_insert(from, PeerState::Discovering, now)
        else {
            debug!(%from, "peer table full, ignoring pairing");
            return None;
        };
        let peer = self.registry.get_mut(index)?;
        peer.name = payload.name;
        peer.last_seen = now;
        peer.online = true;
        peer.requested_at = None;
        let newly_paired = peer.state != PeerState::Paired;
        if newly_paired {
            peer.state = PeerState::Paired;
            info!(%from, name = %peer.name, index, "paired");
            actions.push(Action::RegisterPeer(from));
        }
        Some((index, newly_paired))
    }
}

/// Emit the actions for a removed entry.
fn release(peer: Peer, notify: bool, actions: &mut Vec<Action>) {
    if peer.state == PeerState::Paired {
        if notify {
            actions.push(Action::send(peer.address, Message::Unpair));
        }
        actions.push(Action::DeregisterPeer(peer.address));
    }
    actions.push(Action::Emit(SyncEvent::PeerRemoved(peer.address)));
}

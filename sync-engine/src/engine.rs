//! SyncEngine - the main interface for nebula-sync.
//!
//! # Architecture
//!
//! SyncEngine holds the pure protocol (from sync-core) behind a single
//! mutex and interprets the returned actions to perform actual I/O via
//! the [`Transport`] trait and callbacks via [`SyncHandler`].
//!
//! ```text
//! control surface → SyncEngine → Transport → radio
//!                       ↓
//!              sync-core (pure state machine)
//! ```
//!
//! The lock is only held while the protocol computes actions. Frames are
//! sent and callbacks invoked afterwards, so a callback may call back into
//! the engine without deadlocking.
//!
//! Actions are queued in the order they were computed and executed by one
//! thread at a time. A caller that finds another thread draining leaves its
//! actions to that thread, so the handler sees events in protocol order
//! even when the receive and tick loops race.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use sync_core::{
    Action, Command, ConfigError, LocalState, PeerIndex, PeerSnapshot, ProtocolConfig, SyncEvent,
    SyncProtocol,
};
use sync_types::{Frame, MacAddress, ModePayload, PatternPayload, SyncMode};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::guard::ApplyGuard;
use crate::handler::SyncHandler;
use crate::transport::Transport;

/// Engine construction errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid protocol timings.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Actions waiting to be executed.
#[derive(Debug, Default)]
struct Outbox {
    queue: VecDeque<Action>,
    draining: bool,
}

/// Clears the draining flag if a callback unwinds mid-drain.
struct DrainScope<'a>(&'a Mutex<Outbox>);

impl Drop for DrainScope<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().unwrap_or_else(|e| e.into_inner()).draining = false;
        }
    }
}

/// One device's sync runtime.
pub struct SyncEngine<T: Transport> {
    protocol: Mutex<SyncProtocol>,
    outbox: Mutex<Outbox>,
    transport: T,
    clock: Arc<dyn Clock>,
    handler: Arc<dyn SyncHandler>,
    guard: ApplyGuard,
    seq: AtomicU8,
}

impl<T: Transport> SyncEngine<T> {
    /// Create an engine. The local address is taken from the transport.
    pub fn new(
        name: impl Into<String>,
        config: ProtocolConfig,
        transport: T,
        clock: Arc<dyn Clock>,
        handler: Arc<dyn SyncHandler>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let protocol = SyncProtocol::new(transport.local_address(), name, config);
        Ok(Self {
            protocol: Mutex::new(protocol),
            outbox: Mutex::new(Outbox::default()),
            transport,
            clock,
            handler,
            guard: ApplyGuard::new(),
            seq: AtomicU8::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SyncProtocol> {
        self.protocol.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the protocol under the lock, then execute its actions.
    fn apply(&self, f: impl FnOnce(&mut SyncProtocol, u64) -> Vec<Action>) {
        let now = self.clock.now_ms();
        {
            let mut protocol = self.lock();
            let actions = f(&mut protocol, now);
            // Queue before unlocking so queue order is computation order
            self.outbox().queue.extend(actions);
        }
        self.drain();
    }

    /// Execute queued actions until the queue is empty, unless another
    /// call on the stack or another thread is already doing so.
    fn drain(&self) {
        {
            let mut outbox = self.outbox();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _scope = DrainScope(&self.outbox);
        loop {
            let next = {
                let mut outbox = self.outbox();
                let next = outbox.queue.pop_front();
                if next.is_none() {
                    outbox.draining = false;
                }
                next
            };
            match next {
                Some(action) => self.execute(action),
                None => break,
            }
        }
    }

    // --- Receive path and main loop ---

    /// Receive entry point: validate and route one inbound frame.
    ///
    /// Malformed frames are dropped without a response.
    pub fn handle_frame(&self, from: MacAddress, bytes: &[u8]) {
        let frame = match Frame::from_bytes(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%from, len = bytes.len(), error = %e, "dropping malformed frame");
                return;
            }
        };
        trace!(%from, seq = frame.seq, msg_type = ?frame.message_type(), "frame in");
        self.apply(|protocol, now| protocol.handle_message(from, frame.message, now));
    }

    /// Main-loop entry point: heartbeats, clock sync and liveness sweep.
    pub fn tick(&self) {
        self.apply(|protocol, now| protocol.tick(now));
    }

    // --- Control surface ---

    /// Replace the display state announced in heartbeats.
    pub fn set_local_state(&self, state: LocalState) {
        self.lock().set_local_state(state);
    }

    /// Switch between mirror and independent operation.
    pub fn set_sync_mode(&self, mode: SyncMode) {
        self.lock().set_sync_mode(mode);
    }

    /// Enable or disable accepting inbound pair requests.
    pub fn set_auto_pair(&self, enabled: bool) {
        self.lock().set_auto_pair(enabled);
    }

    /// Change the announced device name.
    pub fn set_local_name(&self, name: impl Into<String>) {
        self.lock().set_name(name);
    }

    /// Broadcast a pair request.
    pub fn start_pairing(&self) {
        self.apply(|protocol, now| protocol.start_pairing(now));
    }

    /// Unpair every peer.
    pub fn unpair_all(&self) {
        self.apply(|protocol, _| protocol.unpair_all());
    }

    /// Unpair the peer in slot `index`.
    pub fn unpair_peer(&self, index: PeerIndex) {
        self.apply(|protocol, _| protocol.unpair_peer(index));
    }

    /// Mirror a display mode change to paired peers.
    pub fn broadcast_mode_change(&self, mode: u8, index: u8) {
        self.mirror(Command::Mode(ModePayload { mode, index }));
    }

    /// Mirror a pattern to paired peers.
    pub fn broadcast_pattern(&self, pattern: PatternPayload) {
        self.mirror(Command::Pattern(pattern));
    }

    /// Mirror a brightness change to paired peers.
    pub fn broadcast_brightness(&self, level: u8) {
        self.mirror(Command::Brightness(level));
    }

    /// Mirror a frame delay change to paired peers.
    pub fn broadcast_frame_rate(&self, delay: u8) {
        self.mirror(Command::FrameRate(delay));
    }

    /// Set the display mode of one peer.
    pub fn send_peer_mode_change(&self, peer: PeerIndex, mode: u8, index: u8) {
        self.unicast(peer, Command::Mode(ModePayload { mode, index }));
    }

    /// Send a pattern to one peer.
    pub fn send_peer_pattern(&self, peer: PeerIndex, pattern: PatternPayload) {
        self.unicast(peer, Command::Pattern(pattern));
    }

    /// Set the brightness of one peer.
    pub fn send_peer_brightness(&self, peer: PeerIndex, level: u8) {
        self.unicast(peer, Command::Brightness(level));
    }

    /// Set the frame delay of one peer.
    pub fn send_peer_frame_rate(&self, peer: PeerIndex, delay: u8) {
        self.unicast(peer, Command::FrameRate(delay));
    }

    fn mirror(&self, command: Command) {
        if self.guard.is_active() {
            debug!(?command, "applying a remote command, not mirroring it back");
            return;
        }
        self.apply(|protocol, _| protocol.mirror_command(command));
    }

    fn unicast(&self, peer: PeerIndex, command: Command) {
        self.apply(|protocol, _| protocol.peer_command(peer, command));
    }

    // --- Queries ---

    /// This device's address.
    pub fn local_address(&self) -> MacAddress {
        self.transport.local_address()
    }

    /// This device's announced name.
    pub fn local_name(&self) -> String {
        self.lock().name().to_string()
    }

    /// Current sync mode.
    pub fn sync_mode(&self) -> SyncMode {
        self.lock().sync_mode()
    }

    /// Display state announced in heartbeats.
    pub fn local_state(&self) -> LocalState {
        self.lock().local_state()
    }

    /// Whether inbound pair requests are accepted.
    pub fn auto_pair(&self) -> bool {
        self.lock().auto_pair()
    }

    /// Number of known peers.
    pub fn peer_count(&self) -> usize {
        self.lock().peer_count()
    }

    /// Snapshot of the peer in slot `index`.
    pub fn peer(&self, index: PeerIndex) -> Option<PeerSnapshot> {
        self.lock().peer(index)
    }

    /// Snapshots of every known peer.
    pub fn peers(&self) -> Vec<PeerSnapshot> {
        self.lock().peers()
    }

    /// Whether at least one peer is paired and online.
    pub fn has_paired_peer(&self) -> bool {
        self.lock().has_paired_peer()
    }

    /// Most recent clock offset estimate (ms).
    pub fn time_offset(&self) -> i32 {
        self.lock().time_offset()
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // --- Action interpreter ---

    fn execute(&self, action: Action) {
        match action {
            Action::Send { to, message } => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                let frame = Frame::new(seq, message);
                let bytes = match frame.to_bytes() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(%to, error = %e, "could not encode frame");
                        return;
                    }
                };
                trace!(%to, seq, msg_type = ?frame.message_type(), "frame out");
                if let Err(e) = self.transport.send(to, &bytes) {
                    warn!(%to, error = %e, "send failed");
                }
            }
            Action::RegisterPeer(address) => {
                if !self.transport.is_registered(&address) {
                    if let Err(e) = self.transport.register_peer(address) {
                        warn!(%address, error = %e, "could not register peer");
                    }
                }
            }
            Action::DeregisterPeer(address) => {
                if self.transport.is_registered(&address) {
                    if let Err(e) = self.transport.deregister_peer(address) {
                        warn!(%address, error = %e, "could not deregister peer");
                    }
                }
            }
            Action::Emit(event) => self.deliver(event),
        }
    }

    fn deliver(&self, event: SyncEvent) {
        let _scope = event.is_remote_command().then(|| self.guard.enter());
        match event {
            SyncEvent::ModeChange(payload) => self.handler.on_mode_change(payload.mode, payload.index),
            SyncEvent::Pattern(pattern) => self.handler.on_pattern(&pattern),
            SyncEvent::Brightness(level) => self.handler.on_brightness(level),
            SyncEvent::FrameRate(delay) => self.handler.on_frame_rate(delay),
            SyncEvent::TimeOffset(offset) => self.handler.on_sync_time(offset),
            SyncEvent::PeerUpdate(snapshot) => self.handler.on_peer_update(&snapshot),
            SyncEvent::PeerRemoved(address) => self.handler.on_peer_removed(address),
        }
    }
}

impl<T: Transport> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("address", &self.transport.local_address())
            .field("protocol", &*self.lock())
            .finish_non_exhaustive()
    }
}

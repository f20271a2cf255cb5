//! # sync-core
//!
//! Pure peer synchronization logic for nebula-sync (no I/O, instant tests).
//!
//! This crate implements pairing, liveness, time synchronization and
//! command distribution without touching a radio or a clock: every entry
//! point takes the current monotonic time in milliseconds and returns a
//! list of [`Action`]s.
//!
//! ## Design Philosophy
//!
//! [`SyncProtocol`] owns the peer table and protocol timers. It is a plain
//! value with no interior locking; the runtime (`sync-engine`) wraps it in
//! a single mutex shared by the receive path and the main-loop tick, and
//! interprets the returned actions (send a frame, register a peer with
//! the radio, invoke an application callback) after releasing the lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod command;
mod config;
mod liveness;
mod pairing;
mod protocol;
mod registry;
mod state;
#[cfg(test)]
mod testutil;
mod timesync;

pub use command::Command;
pub use config::{
    ConfigError, ProtocolConfig, DISCOVERY_TIMEOUT_MS, HEARTBEAT_INTERVAL_MS,
    LIVENESS_TIMEOUT_MS, TIME_SYNC_INTERVAL_MS,
};
pub use protocol::SyncProtocol;
pub use registry::{Peer, PeerIndex, PeerRegistry, PeerSnapshot, PeerState, MAX_PEERS};
pub use state::{Action, LocalState, SyncEvent, DEFAULT_BRIGHTNESS, DEFAULT_FRAME_DELAY};
pub use timesync::clock_offset;

//! # sync-types
//!
//! Wire format types for the nebula-sync peer synchronization protocol.
//!
//! This crate provides the foundational types used across all nebula-sync crates:
//! - [`MacAddress`] - Raw 6-byte radio address identifying a device
//! - [`Frame`] - `[magic:2][type:1][seq:1][payload]` wire frame
//! - [`Message`] - Protocol messages (pairing, commands, heartbeat, time sync)
//! - [`SyncMode`] - Mirror / Independent distribution mode
//! - [`SyncError`] - Decode errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod ids;
mod messages;

pub use error::SyncError;
pub use frame::{Frame, HEADER_LEN, MAGIC, MAX_FRAME_LEN, MAX_PAYLOAD_LEN};
pub use ids::MacAddress;
pub use messages::{
    truncate_name, HeartbeatPayload, Message, MessageType, ModePayload, PairPayload,
    PatternPayload, Rgb, SyncMode, MAX_NAME_BYTES, NAME_FIELD_LEN,
};

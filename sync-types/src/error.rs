//! Error types for nebula-sync.

use thiserror::Error;

use crate::MessageType;

/// Errors produced while decoding or building wire frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Frame shorter than the 4-byte header
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    /// Frame does not start with the protocol magic
    #[error("bad magic: {0:#04x} {1:#04x}")]
    BadMagic(u8, u8),

    /// Invalid message type discriminator
    #[error("invalid message type: {0:#04x}")]
    InvalidMessageType(u8),

    /// Payload shorter than the fixed layout of its message type
    #[error("{msg_type:?} payload too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort {
        /// Message type being decoded
        msg_type: MessageType,
        /// Minimum payload length for this type
        expected: usize,
        /// Payload length actually received
        actual: usize,
    },

    /// Frame exceeds the radio's maximum size
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The OS random source failed
    #[error("entropy source failed: {0}")]
    Entropy(String),
}

//! Frame - the wire format wrapper for all sync messages.
//!
//! ```text
//! [magic0][magic1][type:1][seq:1][payload:0..244]
//! ```

use crate::{Message, MessageType, SyncError};

/// Protocol magic ("NP").
pub const MAGIC: [u8; 2] = [0x4E, 0x50];

/// Header length: magic(2) type(1) seq(1).
pub const HEADER_LEN: usize = 4;

/// Largest payload carried in one frame.
pub const MAX_PAYLOAD_LEN: usize = 244;

/// Largest frame on the wire (fits the 250-byte radio limit).
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN;

/// A decoded frame: sequence number plus typed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender's per-frame counter (wraps); informational only
    pub seq: u8,
    /// The message carried
    pub message: Message,
}

impl Frame {
    /// Create a frame for sending.
    pub fn new(seq: u8, message: Message) -> Self {
        Self { seq, message }
    }

    /// Get the message type.
    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&MAGIC);
        buf.push(self.message_type() as u8);
        buf.push(self.seq);
        self.message.encode_payload(&mut buf);
        if buf.len() > MAX_FRAME_LEN {
            return Err(SyncError::FrameTooLarge(buf.len()));
        }
        Ok(buf)
    }

    /// Deserialize from wire bytes.
    ///
    /// The magic is checked before anything else is parsed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        if bytes.len() < HEADER_LEN {
            return Err(SyncError::TooShort(bytes.len()));
        }
        if bytes[..2] != MAGIC {
            return Err(SyncError::BadMagic(bytes[0], bytes[1]));
        }
        if bytes.len() > MAX_FRAME_LEN {
            return Err(SyncError::FrameTooLarge(bytes.len()));
        }
        let msg_type = MessageType::try_from(bytes[2])?;
        let message = Message::decode(msg_type, &bytes[HEADER_LEN..])?;
        Ok(Self {
            seq: bytes[3],
            message,
        })
    }
}

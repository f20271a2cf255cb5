//! Protocol messages for nebula-sync.
//!
//! Every payload has a fixed little-endian layout. Each type has an explicit
//! encoder and a length-checked decoder; nothing is transmuted from raw memory.
//! Decoders require at least the fixed length and ignore trailing bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{MacAddress, SyncError};

/// Size of the fixed, NUL-padded name field on the wire.
pub const NAME_FIELD_LEN: usize = 24;

/// Maximum name bytes carried on the wire (one byte is kept for the NUL).
pub const MAX_NAME_BYTES: usize = NAME_FIELD_LEN - 1;

/// Message type discriminator (third header byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Ask nearby devices to pair
    PairRequest = 0x01,
    /// Answer to a pair request
    PairResponse = 0x02,
    /// Tear down a pairing
    Unpair = 0x03,
    /// Change display mode
    SetMode = 0x10,
    /// Change procedural pattern
    SetPattern = 0x11,
    /// Change brightness
    SetBrightness = 0x12,
    /// Change frame delay
    SetFrameRate = 0x13,
    /// Periodic self-announcement
    Heartbeat = 0x20,
    /// Clock broadcast for phase alignment
    SyncTime = 0x30,
}

impl TryFrom<u8> for MessageType {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageType::PairRequest),
            0x02 => Ok(MessageType::PairResponse),
            0x03 => Ok(MessageType::Unpair),
            0x10 => Ok(MessageType::SetMode),
            0x11 => Ok(MessageType::SetPattern),
            0x12 => Ok(MessageType::SetBrightness),
            0x13 => Ok(MessageType::SetFrameRate),
            0x20 => Ok(MessageType::Heartbeat),
            0x30 => Ok(MessageType::SyncTime),
            _ => Err(SyncError::InvalidMessageType(value)),
        }
    }
}

/// Whether local state changes are mirrored to paired peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SyncMode {
    /// Local changes are broadcast to every paired, online peer
    #[default]
    Mirror = 0,
    /// Peers are driven individually with unicast commands
    Independent = 1,
}

impl TryFrom<u8> for SyncMode {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SyncMode::Mirror),
            1 => Ok(SyncMode::Independent),
            _ => Err(SyncError::InvalidData(format!("unknown sync mode {}", value))),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Mirror => f.write_str("mirror"),
            SyncMode::Independent => f.write_str("independent"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mirror" => Ok(SyncMode::Mirror),
            "independent" => Ok(SyncMode::Independent),
            other => Err(SyncError::InvalidData(format!("unknown sync mode {:?}", other))),
        }
    }
}

/// Truncate a device name to what fits in the wire name field.
///
/// Cuts on a UTF-8 character boundary so the result is always valid.
pub fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_BYTES {
        return name;
    }
    let mut end = MAX_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn put_name(buf: &mut Vec<u8>, name: &str) {
    let bytes = truncate_name(name).as_bytes();
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + NAME_FIELD_LEN - bytes.len(), 0);
}

fn read_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn require(msg_type: MessageType, payload: &[u8], expected: usize) -> Result<(), SyncError> {
    if payload.len() < expected {
        return Err(SyncError::PayloadTooShort {
            msg_type,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Pair request / response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairPayload {
    /// Sender's own address
    pub address: MacAddress,
    /// Sender's display name
    pub name: String,
    /// Only meaningful in a response: whether pairing was accepted
    pub accepted: bool,
}

impl PairPayload {
    /// Encoded length: address(6) name(24) accepted(1).
    pub const LEN: usize = MacAddress::LEN + NAME_FIELD_LEN + 1;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.address.as_bytes());
        put_name(buf, &self.name);
        buf.push(u8::from(self.accepted));
    }

    fn decode(msg_type: MessageType, payload: &[u8]) -> Result<Self, SyncError> {
        require(msg_type, payload, Self::LEN)?;
        let (addr, rest) = payload.split_at(MacAddress::LEN);
        let address = MacAddress::from_bytes(addr)
            .ok_or_else(|| SyncError::InvalidData("pair address".into()))?;
        Ok(Self {
            address,
            name: read_name(&rest[..NAME_FIELD_LEN]),
            accepted: rest[NAME_FIELD_LEN] != 0,
        })
    }
}

/// Display mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModePayload {
    /// Display mode
    pub mode: u8,
    /// Image / pattern / sequence index within the mode
    pub index: u8,
}

impl ModePayload {
    /// Encoded length.
    pub const LEN: usize = 2;
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb {
    /// Create a colour.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Procedural pattern definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternPayload {
    /// Pattern slot
    pub index: u8,
    /// Pattern kind (rainbow, wave, ...), interpreted by the renderer
    pub pattern_type: u8,
    /// First colour
    pub primary: Rgb,
    /// Second colour
    pub secondary: Rgb,
    /// Animation speed
    pub speed: u8,
}

impl PatternPayload {
    /// Encoded length: index, type, r1 g1 b1, r2 g2 b2, speed.
    pub const LEN: usize = 9;
}

/// Periodic self-announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    /// Current display mode
    pub mode: u8,
    /// Current index within the mode
    pub index: u8,
    /// Current brightness
    pub brightness: u8,
    /// Current frame delay (ms)
    pub frame_delay: u8,
    /// Sender uptime in milliseconds (wraps)
    pub uptime_ms: u32,
    /// Sender's sync mode, `None` when the byte is not one we know
    pub sync_mode: Option<SyncMode>,
    /// Sender's display name
    pub name: String,
}

impl HeartbeatPayload {
    /// Encoded length: 4 state bytes, uptime(4), sync mode(1), name(24).
    pub const LEN: usize = 4 + 4 + 1 + NAME_FIELD_LEN;

    /// Sync mode byte sent when the mode is unknown.
    pub const UNKNOWN_SYNC_MODE: u8 = 0xFF;
}

/// All possible protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Broadcast request to pair
    PairRequest(PairPayload),
    /// Unicast answer to a pair request
    PairResponse(PairPayload),
    /// Tear down the pairing with the receiver
    Unpair,
    /// Change display mode
    SetMode(ModePayload),
    /// Change procedural pattern
    SetPattern(PatternPayload),
    /// Change brightness
    SetBrightness {
        /// New brightness
        brightness: u8,
    },
    /// Change frame delay
    SetFrameRate {
        /// New frame delay (ms)
        frame_delay: u8,
    },
    /// Periodic self-announcement
    Heartbeat(HeartbeatPayload),
    /// Sender's clock for phase alignment
    SyncTime {
        /// Sender's millisecond clock (wraps)
        sender_clock: u32,
    },
}

impl Message {
    /// The wire discriminator for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::PairRequest(_) => MessageType::PairRequest,
            Message::PairResponse(_) => MessageType::PairResponse,
            Message::Unpair => MessageType::Unpair,
            Message::SetMode(_) => MessageType::SetMode,
            Message::SetPattern(_) => MessageType::SetPattern,
            Message::SetBrightness { .. } => MessageType::SetBrightness,
            Message::SetFrameRate { .. } => MessageType::SetFrameRate,
            Message::Heartbeat(_) => MessageType::Heartbeat,
            Message::SyncTime { .. } => MessageType::SyncTime,
        }
    }

    /// Append the encoded payload to `buf`.
    pub fn encode_payload(&self, buf: &mut Vec<u8>) {
        match self {
            Message::PairRequest(p) | Message::PairResponse(p) => p.encode(buf),
            Message::Unpair => {}
            Message::SetMode(p) => buf.extend_from_slice(&[p.mode, p.index]),
            Message::SetPattern(p) => buf.extend_from_slice(&[
                p.index,
                p.pattern_type,
                p.primary.r,
                p.primary.g,
                p.primary.b,
                p.secondary.r,
                p.secondary.g,
                p.secondary.b,
                p.speed,
            ]),
            Message::SetBrightness { brightness } => buf.push(*brightness),
            Message::SetFrameRate { frame_delay } => buf.push(*frame_delay),
            Message::Heartbeat(hb) => {
                buf.extend_from_slice(&[hb.mode, hb.index, hb.brightness, hb.frame_delay]);
                buf.extend_from_slice(&hb.uptime_ms.to_le_bytes());
                buf.push(
                    hb.sync_mode
                        .map_or(HeartbeatPayload::UNKNOWN_SYNC_MODE, |m| m as u8),
                );
                put_name(buf, &hb.name);
            }
            Message::SyncTime { sender_clock } => {
                buf.extend_from_slice(&sender_clock.to_le_bytes())
            }
        }
    }

    /// Decode a payload of the given type.
    pub fn decode(msg_type: MessageType, payload: &[u8]) -> Result<Self, SyncError> {
        match msg_type {
            MessageType::PairRequest => {
                PairPayload::decode(msg_type, payload).map(Message::PairRequest)
            }
            MessageType::PairResponse => {
                PairPayload::decode(msg_type, payload).map(Message::PairResponse)
            }
            MessageType::Unpair => Ok(Message::Unpair),
            MessageType::SetMode => {
                require(msg_type, payload, ModePayload::LEN)?;
                Ok(Message::SetMode(ModePayload {
                    mode: payload[0],
                    index: payload[1],
                }))
            }
            MessageType::SetPattern => {
                require(msg_type, payload, PatternPayload::LEN)?;
                Ok(Message::SetPattern(PatternPayload {
                    index: payload[0],
                    pattern_type: payload[1],
                    primary: Rgb::new(payload[2], payload[3], payload[4]),
                    secondary: Rgb::new(payload[5], payload[6], payload[7]),
                    speed: payload[8],
                }))
            }
            MessageType::SetBrightness => {
                require(msg_type, payload, 1)?;
                Ok(Message::SetBrightness {
                    brightness: payload[0],
                })
            }
            MessageType::SetFrameRate => {
                require(msg_type, payload, 1)?;
                Ok(Message::SetFrameRate {
                    frame_delay: payload[0],
                })
            }
            MessageType::Heartbeat => {
                require(msg_type, payload, HeartbeatPayload::LEN)?;
                let uptime = [payload[4], payload[5], payload[6], payload[7]];
                Ok(Message::Heartbeat(HeartbeatPayload {
                    mode: payload[0],
                    index: payload[1],
                    brightness: payload[2],
                    frame_delay: payload[3],
                    uptime_ms: u32::from_le_bytes(uptime),
                    sync_mode: SyncMode::try_from(payload[8]).ok(),
                    name: read_name(&payload[9..9 + NAME_FIELD_LEN]),
                }))
            }
            MessageType::SyncTime => {
                require(msg_type, payload, 4)?;
                let clock = [payload[0], payload[1], payload[2], payload[3]];
                Ok(Message::SyncTime {
                    sender_clock: u32::from_le_bytes(clock),
                })
            }
        }
    }
}

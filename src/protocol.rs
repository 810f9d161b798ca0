//! Device message protocol.
//!
//! This module owns **every message that crosses the channel** between the
//! frame pipeline and the downstream device.
//!
//! ## Message keys
//!
//! | Key         | Direction        | Payload                                  |
//! |-------------|------------------|------------------------------------------|
//! | `ROOMNAME`  | host → device    | NUL-terminated name, at most 32 bytes    |
//! | `ROOMCOUNT` | host → device    | little-endian `i32`                      |
//! | `TERRAIN`   | host → device    | 2500 raw color bytes (the baseline)      |
//! | `FRAME`     | host → device    | `[index, color, x, y, color, x, y, ...]` |
//! | `SWITCH`    | device → host    | one byte, requested room index           |
//!
//! ## Design rules
//!
//! 1. The baseline is always a full 2500-byte bitmap, never a diff.
//! 2. Frame indices occupy a single byte; the encoder refuses larger ones.
//! 3. Coordinates are `0..50` and always fit a byte.
//! 4. One message is in flight at a time; ordering is the sender's job.

use crate::diff::DiffRecord;
use crate::error::ProtocolError;
use crate::types::Bitmap;

/// Every key used on the device channel, as constants.
pub mod keys {
    pub const ROOM_NAME: &str = "ROOMNAME";
    pub const ROOM_COUNT: &str = "ROOMCOUNT";
    pub const TERRAIN: &str = "TERRAIN";
    pub const FRAME: &str = "FRAME";
    pub const SWITCH: &str = "SWITCH";
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    RoomName(String),
    RoomCount(u32),
    /// The first frame of a batch, sent whole.
    Baseline(Bitmap),
    Frame(DiffRecord),
}

impl OutboundMessage {
    pub fn key(&self) -> &'static str {
        match self {
            Self::RoomName(_) => keys::ROOM_NAME,
            Self::RoomCount(_) => keys::ROOM_COUNT,
            Self::Baseline(_) => keys::TERRAIN,
            Self::Frame(_) => keys::FRAME,
        }
    }

    /// Wire bytes for the message value.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::RoomName(name) => {
                let mut bytes = name.as_bytes().to_vec();
                bytes.push(0);
                Ok(bytes)
            }
            Self::RoomCount(count) => {
                Ok((i32::try_from(*count).unwrap_or(i32::MAX)).to_le_bytes().to_vec())
            }
            Self::Baseline(bitmap) => Ok(bitmap.as_slice().to_vec()),
            Self::Frame(record) => encode_frame(record),
        }
    }
}

/// `[index, color, x, y, ...]`.
pub fn encode_frame(record: &DiffRecord) -> Result<Vec<u8>, ProtocolError> {
    let index = u8::try_from(record.index)
        .map_err(|_| ProtocolError::FrameIndexOverflow(record.index))?;

    let mut bytes = Vec::with_capacity(1 + record.changes.len() * 3);
    bytes.push(index);
    for change in &record.changes {
        bytes.extend_from_slice(&[change.color, change.x, change.y]);
    }
    Ok(bytes)
}

/// Shorten `name` so that it plus a terminating NUL fits `limit` bytes,
/// cutting on a character boundary.
pub fn truncate_room_name(name: &str, limit: usize) -> String {
    let max = limit.saturating_sub(1);
    if name.len() <= max {
        return name.to_owned();
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    /// The user asked for another room.
    Switch(u8),
}

impl InboundMessage {
    pub fn decode(key: &str, payload: &[u8]) -> Result<Self, ProtocolError> {
        match key {
            keys::SWITCH => match payload {
                [index] => Ok(Self::Switch(*index)),
                _ => Err(ProtocolError::BadPayload {
                    key: keys::SWITCH,
                    len: payload.len(),
                }),
            },
            other => Err(ProtocolError::UnknownKey(other.to_owned())),
        }
    }
}

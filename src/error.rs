//! Error types for the frame pipeline, the device protocol, and delivery.
//!
//! Structural failures (terrain decode, diff dimensions, history shape) are
//! [`FrameError`] and abort the batch build.  Send outcomes are
//! [`TransportError`]; an aborted batch delivery is a [`DeliveryError`].

use crate::types::Tick;
use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// Build-time errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FrameError {
    /// The terrain string does not have one digit per cell.
    #[error("malformed terrain: expected {expected} cells, got {actual}")]
    MalformedTerrain { expected: usize, actual: usize },

    /// A terrain cell carries a code outside the closed `0..=3` set.
    #[error("unknown terrain code {code:?} at cell {index}")]
    UnknownTerrainCode { index: usize, code: char },

    /// Two bitmaps handed to the diff encoder differ in size.
    #[error("bitmap dimension mismatch: previous has {previous} cells, current has {current}")]
    DimensionMismatch { previous: usize, current: usize },

    /// The history document names a base tick it does not contain.
    #[error("history has no snapshot for base tick {0}")]
    MissingBaseTick(Tick),

    /// A delta was offered at or before the last consumed tick.
    #[error("tick {tick} is not after the last applied tick {last}")]
    OutOfOrderTick { tick: Tick, last: Tick },

    #[error("invalid history document: {0}")]
    InvalidHistory(#[from] serde_json::Error),

    #[error("invalid palette: {0}")]
    InvalidPalette(#[from] config::ConfigError),
}

/// Non-fatal: an object type with no palette entry.
///
/// Never propagated; the color mapper logs it and falls back to the hostile
/// color.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no color for object type {}", .type_name.as_deref().unwrap_or("<missing>"))]
pub struct UnresolvedObjectType {
    pub type_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The device addresses frames with a single byte.
    #[error("frame index {0} does not fit the one-byte frame slot")]
    FrameIndexOverflow(u32),

    #[error("unexpected {key} payload of {len} byte(s)")]
    BadPayload { key: &'static str, len: usize },

    #[error("unknown inbound message key {0:?}")]
    UnknownKey(String),
}

// ---------------------------------------------------------------------------
// Transport / delivery errors
// ---------------------------------------------------------------------------

/// Outcome of a single send that did not succeed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device answered with a negative acknowledgment.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The channel itself failed (closed, dropped acknowledgment, I/O).
    #[error("transport failure: {0}")]
    Failed(String),

    #[error(transparent)]
    Encoding(#[from] ProtocolError),
}

/// Which message of a room sequence was being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStage {
    RoomName,
    RoomCount,
    Baseline,
    Frame(u32),
}

impl fmt::Display for DeliveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomName => write!(f, "room name"),
            Self::RoomCount => write!(f, "room count"),
            Self::Baseline => write!(f, "baseline"),
            Self::Frame(index) => write!(f, "frame {index}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A send failed; nothing after `stage` was attempted.
    #[error("delivery aborted at {stage} after {acknowledged} acknowledged message(s): {source}")]
    Aborted {
        stage: DeliveryStage,
        acknowledged: usize,
        #[source]
        source: TransportError,
    },

    /// The cancellation signal fired before `stage` was issued.
    #[error("delivery cancelled before {stage} after {acknowledged} acknowledged message(s)")]
    Cancelled {
        stage: DeliveryStage,
        acknowledged: usize,
    },
}

impl DeliveryError {
    pub fn acknowledged(&self) -> usize {
        match self {
            Self::Aborted { acknowledged, .. } | Self::Cancelled { acknowledged, .. } => {
                *acknowledged
            }
        }
    }

    pub fn stage(&self) -> DeliveryStage {
        match self {
            Self::Aborted { stage, .. } | Self::Cancelled { stage, .. } => *stage,
        }
    }
}

// ---------------------------------------------------------------------------
// Feed errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no rooms to show")]
    NoRooms,

    /// An upstream collaborator (terrain, clock, history) failed.
    #[error("failed to fetch {what} for room {room}: {source}")]
    Source {
        what: &'static str,
        room: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

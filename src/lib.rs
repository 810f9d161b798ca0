//! Room Frames
//!
//! Turns a window of room history into a baseline bitmap plus per-tick
//! sparse diffs, and streams them to a small device one acknowledged message
//! at a time.
//!
//! ## Architecture
//!
//! ```text
//! RoomFeed  (feed.rs)             ← room selection, sources, device loop
//!   ├── FrameService  (service.rs) ← batch build
//!   │     ├── TerrainDecoder      (terrain.rs)
//!   │     ├── SnapshotAccumulator (snapshot.rs)
//!   │     ├── FrameRasterizer     (raster.rs) → ColorMapper (palette.rs)
//!   │     └── diff                (diff.rs)
//!   └── deliver  (delivery.rs)     ← acknowledgment-gated send loop
//!         └── OutboundMessage (protocol.rs)
//! ```
//!
//! The pipeline is synchronous and owns its state for one replay.  Only
//! delivery suspends, and it never has more than one message in flight.

// Pipeline and protocol types are always available (no server feature needed).
pub mod diff;
pub mod error;
pub mod palette;
pub mod protocol;
pub mod raster;
pub mod service;
pub mod snapshot;
pub mod terrain;
pub mod types;

// Async delivery requires the `server` feature.
#[cfg(feature = "server")]
pub mod delivery;
#[cfg(feature = "server")]
pub mod feed;

// Convenience re-exports
pub use diff::{diff, DiffRecord, PixelChange};
pub use error::{DeliveryError, FrameError, ProtocolError, TransportError};
pub use palette::{ColorMapper, Palette};
pub use raster::FrameRasterizer;
pub use service::{FrameBatch, FrameService};
pub use snapshot::{ObjectView, SnapshotAccumulator};
pub use terrain::{TerrainDecoder, TerrainSource};
pub use types::{
    Bitmap, CellCoord, ColorCode, FrameServiceConfig, FrameStats, HistoryDocument,
    ObjectAttributes, Terrain, Tick, TickDelta, CELL_COUNT, ROOM_SIZE,
};

#[cfg(feature = "server")]
pub use delivery::{
    deliver, deliver_until, send_room_header, ChannelTransport, DeliveryReport, Transport,
};
#[cfg(feature = "server")]
pub use feed::{HistorySource, RoomFeed};

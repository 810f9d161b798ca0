//! Core room types shared across all modules.

use crate::error::FrameError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::palette::Palette;

/// Rooms are square, 50 cells on a side.
pub const ROOM_SIZE: usize = 50;
pub const CELL_COUNT: usize = ROOM_SIZE * ROOM_SIZE;

/// One byte per cell, in the device's 8-bit color format.
pub type ColorCode = u8;

/// A discrete timestep of the room's history.
pub type Tick = u64;

// ---------------------------------------------------------------------------
// Grid cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct CellCoord {
    pub x: u8,
    pub y: u8,
}

impl CellCoord {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Checked conversion from raw coordinates; `None` outside the room.
    pub fn checked(x: i64, y: i64) -> Option<Self> {
        let limit = ROOM_SIZE as i64;
        if (0..limit).contains(&x) && (0..limit).contains(&y) {
            Some(Self::new(x as u8, y as u8))
        } else {
            None
        }
    }

    /// Flat cell index, `x + y * 50`.
    pub fn index(self) -> usize {
        self.x as usize + self.y as usize * ROOM_SIZE
    }
}

// ---------------------------------------------------------------------------
// Grids
// ---------------------------------------------------------------------------

/// Decoded terrain colors for one room.  Immutable once decoded.
#[derive(Clone, PartialEq, Eq)]
pub struct Terrain {
    cells: Box<[ColorCode; CELL_COUNT]>,
}

impl Terrain {
    pub(crate) fn from_cells(cells: Box<[ColorCode; CELL_COUNT]>) -> Self {
        Self { cells }
    }

    /// A terrain of a single color, mostly useful in tests.
    pub fn filled(color: ColorCode) -> Self {
        Self::from_cells(Box::new([color; CELL_COUNT]))
    }

    pub fn at(&self, cell: CellCoord) -> ColorCode {
        self.cells[cell.index()]
    }

    pub fn as_slice(&self) -> &[ColorCode] {
        self.cells.as_slice()
    }
}

impl std::fmt::Debug for Terrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terrain").field("cells", &CELL_COUNT).finish()
    }
}

/// Fully resolved per-cell colors for one tick.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    cells: Box<[ColorCode; CELL_COUNT]>,
}

impl Bitmap {
    /// Start a frame from the terrain underneath it.
    pub fn from_terrain(terrain: &Terrain) -> Self {
        Self {
            cells: terrain.cells.clone(),
        }
    }

    pub fn at(&self, cell: CellCoord) -> ColorCode {
        self.cells[cell.index()]
    }

    pub fn set(&mut self, cell: CellCoord, color: ColorCode) {
        self.cells[cell.index()] = color;
    }

    pub fn as_slice(&self) -> &[ColorCode] {
        self.cells.as_slice()
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let distinct: std::collections::BTreeSet<_> = self.cells.iter().collect();
        f.debug_struct("Bitmap")
            .field("cells", &CELL_COUNT)
            .field("colors", &distinct)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Room objects
// ---------------------------------------------------------------------------

/// Named properties of one room object (`type`, `x`, `y`, `energy`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectAttributes(Map<String, Value>);

impl ObjectAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Position within the room; `None` when missing or off the grid.
    pub fn cell(&self) -> Option<CellCoord> {
        let x = self.0.get("x").and_then(Value::as_i64)?;
        let y = self.0.get("y").and_then(Value::as_i64)?;
        CellCoord::checked(x, y)
    }

    /// Stored energy, read from `energy` and falling back to `store.energy`.
    pub fn energy(&self) -> Option<f64> {
        self.0
            .get("energy")
            .and_then(Value::as_f64)
            .or_else(|| self.0.get("store")?.get("energy")?.as_f64())
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.0.get(property)
    }

    /// Overwrite every property named in `patch`; leave the rest alone.
    pub fn patch(&mut self, patch: &ObjectAttributes) {
        for (property, value) in &patch.0 {
            self.0.insert(property.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ObjectAttributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Changed properties per object id for one tick.
///
/// A `null` entry (upstream marks removed objects that way) carries no
/// properties and is ignored; removal is not modeled.
pub type TickDelta = IndexMap<String, Option<ObjectAttributes>>;

// ---------------------------------------------------------------------------
// History document
// ---------------------------------------------------------------------------

/// A bounded window of room history: a full snapshot at `base` followed by
/// sparse per-tick deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub base: Tick,
    #[serde(default)]
    pub ticks: BTreeMap<Tick, Option<TickDelta>>,
}

impl HistoryDocument {
    pub fn new(base: Tick, snapshot: TickDelta) -> Self {
        let mut ticks = BTreeMap::new();
        ticks.insert(base, Some(snapshot));
        Self {
            room: None,
            base,
            ticks,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Builder-style helper for adding a delta tick.
    pub fn with_tick(mut self, tick: Tick, delta: TickDelta) -> Self {
        self.ticks.insert(tick, Some(delta));
        self
    }

    /// The full snapshot recorded at the base tick.
    pub fn base_snapshot(&self) -> Result<&TickDelta, FrameError> {
        self.ticks
            .get(&self.base)
            .and_then(Option::as_ref)
            .ok_or(FrameError::MissingBaseTick(self.base))
    }

    /// Deltas after the base tick, ascending.  Absent and `null` ticks are
    /// skipped.
    pub fn deltas(&self) -> impl Iterator<Item = (Tick, &TickDelta)> {
        self.ticks
            .range(self.base.saturating_add(1)..)
            .filter_map(|(tick, delta)| delta.as_ref().map(|d| (*tick, d)))
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

/// Summary of the most recent batch build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub base_tick: Tick,
    pub ticks_replayed: usize,
    /// Ticks past the device's frame table, left out of the batch.
    pub ticks_dropped: usize,
    pub objects_in_view: usize,
    pub changed_cells: usize,
    /// Object types with no palette entry, sorted.
    pub unresolved_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FrameServiceConfig {
    /// Colors, energy-holding types, and suppressed types.
    pub palette: Palette,
    /// How far behind the live game time history becomes available.
    pub history_lag_ticks: Tick,
    /// History is published in windows aligned to this many ticks.
    pub history_chunk_ticks: Tick,
    /// Device buffer for the room name, including the terminating NUL.
    pub room_name_limit: usize,
    /// Frame slots on the device; later ticks are not turned into diffs.
    pub max_frames: usize,
}

impl Default for FrameServiceConfig {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            history_lag_ticks: 120,
            history_chunk_ticks: 20,
            room_name_limit: 32,
            max_frames: 20,
        }
    }
}

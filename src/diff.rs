//! Sparse diff encoding between consecutive bitmaps.
//!
//! Cells are visited `y` outer, `x` inner, so identical inputs always yield
//! the same record, byte for byte.

use crate::error::FrameError;
use crate::types::{CellCoord, ColorCode, CELL_COUNT, ROOM_SIZE};

/// One changed cell: its new color and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelChange {
    pub color: ColorCode,
    pub x: u8,
    pub y: u8,
}

impl PixelChange {
    pub fn cell(&self) -> CellCoord {
        CellCoord::new(self.x, self.y)
    }
}

/// The changed cells of frame `index` relative to the frame before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffRecord {
    pub index: u32,
    pub changes: Vec<PixelChange>,
}

impl DiffRecord {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Patch `cells` in place, the way the device applies a frame.
    pub fn apply_to(&self, cells: &mut [ColorCode]) {
        for change in &self.changes {
            cells[change.cell().index()] = change.color;
        }
    }
}

/// Compute the changed cells from `previous` to `current`.
pub fn diff(
    index: u32,
    previous: &[ColorCode],
    current: &[ColorCode],
) -> Result<DiffRecord, FrameError> {
    if previous.len() != CELL_COUNT || current.len() != CELL_COUNT {
        return Err(FrameError::DimensionMismatch {
            previous: previous.len(),
            current: current.len(),
        });
    }

    let mut changes = Vec::new();
    for y in 0..ROOM_SIZE {
        for x in 0..ROOM_SIZE {
            let cell = x + y * ROOM_SIZE;
            if previous[cell] != current[cell] {
                changes.push(PixelChange {
                    color: current[cell],
                    x: x as u8,
                    y: y as u8,
                });
            }
        }
    }

    Ok(DiffRecord { index, changes })
}

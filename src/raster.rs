//! Frame rasterizer: terrain plus object view into one bitmap.

use crate::palette::ColorMapper;
use crate::snapshot::ObjectView;
use crate::types::{Bitmap, Terrain};
use log::warn;

#[derive(Debug, Clone, Default)]
pub struct FrameRasterizer {
    mapper: ColorMapper,
}

impl FrameRasterizer {
    pub fn new(mapper: ColorMapper) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &ColorMapper {
        &self.mapper
    }

    /// Draw every non-suppressed object over a copy of the terrain.
    ///
    /// Objects are drawn in view order, so when two share a cell the later
    /// one wins.  Objects without a position on the grid are skipped.
    pub fn render(&self, terrain: &Terrain, view: &ObjectView) -> Bitmap {
        let palette = self.mapper.palette();
        let mut bitmap = Bitmap::from_terrain(terrain);

        for (id, attributes) in view.iter() {
            if attributes
                .object_type()
                .is_some_and(|t| palette.is_suppressed(t))
            {
                continue;
            }
            let Some(cell) = attributes.cell() else {
                warn!("Object {} has no position inside the room, not drawn", id);
                continue;
            };
            bitmap.set(cell, self.mapper.resolve_color(attributes));
        }

        bitmap
    }
}

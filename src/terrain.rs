//! Terrain subsystem: the TerrainSource collaborator and the digit-string
//! decoder.
//!
//! Terrain arrives as one ASCII digit per cell in `x + y * 50` order.  The
//! code set is closed: `0` plain, `1`/`3` wall, `2` swamp.  Anything else is
//! a protocol violation and fails the decode; unlike object types there is
//! no fallback color.

use crate::error::{BoxError, FrameError};
use crate::palette::{Palette, TerrainColors};
use crate::types::{ColorCode, Terrain, CELL_COUNT};
use std::future::Future;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Anything that can supply the raw terrain string for a room.
///
/// Fetching and caching live behind this trait; the pipeline only needs the
/// decoded digits.
pub trait TerrainSource {
    fn terrain(&self, room: &str) -> impl Future<Output = Result<String, BoxError>> + Send;
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct TerrainDecoder {
    colors: TerrainColors,
}

impl TerrainDecoder {
    pub fn new(palette: &Palette) -> Self {
        Self {
            colors: palette.terrain_colors(),
        }
    }

    pub fn decode(&self, raw: &str) -> Result<Terrain, FrameError> {
        let actual = raw.chars().count();
        if actual != CELL_COUNT {
            return Err(FrameError::MalformedTerrain {
                expected: CELL_COUNT,
                actual,
            });
        }

        let mut cells = Box::new([0; CELL_COUNT]);
        for (index, (cell, code)) in cells.iter_mut().zip(raw.chars()).enumerate() {
            *cell = self.color_for(code).ok_or(FrameError::UnknownTerrainCode { index, code })?;
        }

        Ok(Terrain::from_cells(cells))
    }

    fn color_for(&self, code: char) -> Option<ColorCode> {
        match code {
            '0' => Some(self.colors.plain),
            '1' | '3' => Some(self.colors.wall),
            '2' => Some(self.colors.swamp),
            _ => None,
        }
    }
}

impl Default for TerrainDecoder {
    fn default() -> Self {
        Self::new(&Palette::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellCoord;

    #[test]
    fn walls_collapse_to_one_color() {
        let mut raw = "0".repeat(CELL_COUNT);
        raw.replace_range(0..4, "0123");
        let terrain = TerrainDecoder::default().decode(&raw).unwrap();
        assert_eq!(terrain.at(CellCoord::new(0, 0)), 213);
        assert_eq!(terrain.at(CellCoord::new(1, 0)), 192);
        assert_eq!(terrain.at(CellCoord::new(2, 0)), 216);
        assert_eq!(terrain.at(CellCoord::new(3, 0)), 192);
    }

    #[test]
    fn trailing_newline_counts_toward_length() {
        let raw = format!("{}\n", "2".repeat(CELL_COUNT));
        match TerrainDecoder::default().decode(&raw) {
            Err(FrameError::MalformedTerrain { actual, .. }) => assert_eq!(actual, CELL_COUNT + 1),
            other => panic!("expected MalformedTerrain, got {other:?}"),
        }
    }

    #[test]
    fn trailing_space_in_the_last_cell_is_an_unknown_code() {
        let raw = format!("{} ", "0".repeat(CELL_COUNT - 1));
        match TerrainDecoder::default().decode(&raw) {
            Err(FrameError::UnknownTerrainCode { index, code }) => {
                assert_eq!((index, code), (CELL_COUNT - 1, ' '));
            }
            other => panic!("expected UnknownTerrainCode, got {other:?}"),
        }
    }

    #[test]
    fn multibyte_input_reports_char_count() {
        let raw = "é".repeat(CELL_COUNT / 2);
        match TerrainDecoder::default().decode(&raw) {
            Err(FrameError::MalformedTerrain { actual, .. }) => assert_eq!(actual, CELL_COUNT / 2),
            other => panic!("expected MalformedTerrain, got {other:?}"),
        }
    }
}

//! Color palette and the object color mapper.
//!
//! A [`Palette`] is an immutable table built once (defaults, optionally
//! layered with a TOML overrides file) and handed to [`ColorMapper`] and the
//! terrain decoder.  Resolution is two-stage: type table first, then the
//! zero-energy override for energy-holding structures.

use crate::error::{FrameError, UnresolvedObjectType};
use crate::types::{ColorCode, ObjectAttributes};
use log::debug;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

// Upstream type names.
pub const PLAIN: &str = "plain";
pub const WALL: &str = "wall";
pub const SWAMP: &str = "swamp";

const DEFAULT_COLORS: &[(&str, ColorCode)] = &[
    (PLAIN, 213),
    ("road", 234),
    (WALL, 192),
    ("constructedWall", 192),
    ("constructionSite", 232),
    ("extension", 252),
    ("spawn", 252),
    ("tower", 252),
    ("link", 252),
    ("storage", 252),
    ("container", 252),
    (SWAMP, 216),
    ("source", 252),
    ("creep", 199),
    ("controller", 255),
    ("mineral", 255),
];

/// Structures drawn in the empty color while they hold no energy.
const DEFAULT_ENERGY_HOLDERS: &[&str] = &["extension", "spawn", "tower", "storage", "link"];

/// Defensive structures, dropped energy, and extractors never draw a pixel.
const DEFAULT_SUPPRESSED: &[&str] = &["rampart", "energy", "extractor"];

/// Color for objects of unknown type (typically other players' structures).
const DEFAULT_FALLBACK: ColorCode = 220;
const DEFAULT_EMPTY: ColorCode = 232;

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: HashMap<String, ColorCode>,
    energy_holders: HashSet<String>,
    suppressed: HashSet<String>,
    fallback: ColorCode,
    empty: ColorCode,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS
                .iter()
                .map(|(name, color)| (name.to_string(), *color))
                .collect(),
            energy_holders: DEFAULT_ENERGY_HOLDERS.iter().map(|s| s.to_string()).collect(),
            suppressed: DEFAULT_SUPPRESSED.iter().map(|s| s.to_string()).collect(),
            fallback: DEFAULT_FALLBACK,
            empty: DEFAULT_EMPTY,
        }
    }
}

/// On-disk palette overrides.
///
/// Colors are a list of `{ type, color }` tables so upstream camel-case type
/// names survive the config loader untouched.
///
/// ```toml
/// fallback = 240
/// suppressed = ["rampart", "energy", "extractor", "road"]
///
/// [[colors]]
/// type = "creep"
/// color = 239
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaletteOverrides {
    #[serde(default)]
    pub colors: Vec<ColorOverride>,
    pub fallback: Option<ColorCode>,
    pub empty: Option<ColorCode>,
    pub energy_holders: Option<Vec<String>>,
    pub suppressed: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColorOverride {
    #[serde(rename = "type")]
    pub type_name: String,
    pub color: ColorCode,
}

impl Palette {
    /// Default palette layered with the overrides file at `path`.
    pub fn load(path: &Path) -> Result<Self, FrameError> {
        let overrides: PaletteOverrides = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        Ok(Self::default().with_overrides(overrides))
    }

    pub fn with_overrides(mut self, overrides: PaletteOverrides) -> Self {
        for entry in overrides.colors {
            self.colors.insert(entry.type_name, entry.color);
        }
        if let Some(fallback) = overrides.fallback {
            self.fallback = fallback;
        }
        if let Some(empty) = overrides.empty {
            self.empty = empty;
        }
        if let Some(holders) = overrides.energy_holders {
            self.energy_holders = holders.into_iter().collect();
        }
        if let Some(suppressed) = overrides.suppressed {
            self.suppressed = suppressed.into_iter().collect();
        }
        self
    }

    pub fn color(&self, type_name: &str) -> Option<ColorCode> {
        self.colors.get(type_name).copied()
    }

    pub fn holds_energy(&self, type_name: &str) -> bool {
        self.energy_holders.contains(type_name)
    }

    pub fn is_suppressed(&self, type_name: &str) -> bool {
        self.suppressed.contains(type_name)
    }

    pub fn fallback(&self) -> ColorCode {
        self.fallback
    }

    pub fn empty(&self) -> ColorCode {
        self.empty
    }

    /// Terrain colors, falling back to the built-in values if an overrides
    /// file ever removed them.
    pub fn terrain_colors(&self) -> TerrainColors {
        TerrainColors {
            plain: self.color(PLAIN).unwrap_or(213),
            wall: self.color(WALL).unwrap_or(192),
            swamp: self.color(SWAMP).unwrap_or(216),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainColors {
    pub plain: ColorCode,
    pub wall: ColorCode,
    pub swamp: ColorCode,
}

// ---------------------------------------------------------------------------
// Color mapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ColorMapper {
    palette: Palette,
}

impl ColorMapper {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Type-table stage only.
    pub fn lookup(&self, attributes: &ObjectAttributes) -> Result<ColorCode, UnresolvedObjectType> {
        attributes
            .object_type()
            .and_then(|t| self.palette.color(t))
            .ok_or_else(|| UnresolvedObjectType {
                type_name: attributes.object_type().map(str::to_owned),
            })
    }

    /// Final color for an object: table lookup (hostile fallback for unknown
    /// types), then the empty-color override for drained energy holders.
    pub fn resolve_color(&self, attributes: &ObjectAttributes) -> ColorCode {
        let color = self.lookup(attributes).unwrap_or_else(|unresolved| {
            debug!("{unresolved}, using fallback {}", self.palette.fallback);
            self.palette.fallback
        });

        match attributes.object_type() {
            Some(t) if self.palette.holds_energy(t) && attributes.energy() == Some(0.0) => {
                self.palette.empty
            }
            _ => color,
        }
    }
}

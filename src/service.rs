//! FrameService – replays a history window into a baseline bitmap plus
//! per-tick sparse diffs.

use crate::diff::{diff, DiffRecord};
use crate::error::FrameError;
use crate::palette::ColorMapper;
use crate::raster::FrameRasterizer;
use crate::snapshot::{ObjectView, SnapshotAccumulator};
use crate::terrain::TerrainDecoder;
use crate::types::{
    Bitmap, FrameServiceConfig, FrameStats, HistoryDocument, ObjectAttributes, Terrain, Tick,
};
use log::{debug, info, warn};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Build result
// ---------------------------------------------------------------------------

/// Everything the device needs for one room window.
///
/// The baseline already shows the base tick's objects; `diffs[i]` turns frame
/// `i` into frame `i + 1` and carries index `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch {
    pub baseline: Bitmap,
    pub diffs: Vec<DiffRecord>,
}

impl FrameBatch {
    /// Baseline plus one message per diff.
    pub fn message_count(&self) -> usize {
        1 + self.diffs.len()
    }

    pub fn changed_cells(&self) -> usize {
        self.diffs.iter().map(DiffRecord::len).sum()
    }
}

pub struct FrameService {
    config: FrameServiceConfig,
    decoder: TerrainDecoder,
    rasterizer: FrameRasterizer,
    stats: FrameStats,
    builds: u64,
}

impl FrameService {
    pub fn new(config: FrameServiceConfig) -> Self {
        let decoder = TerrainDecoder::new(&config.palette);
        let rasterizer = FrameRasterizer::new(ColorMapper::new(config.palette.clone()));
        Self {
            config,
            decoder,
            rasterizer,
            stats: FrameStats::default(),
            builds: 0,
        }
    }

    pub fn config(&self) -> &FrameServiceConfig {
        &self.config
    }

    pub fn decode_terrain(&self, raw: &str) -> Result<Terrain, FrameError> {
        self.decoder.decode(raw)
    }

    // -----------------------------------------------------------------------
    // History window
    // -----------------------------------------------------------------------

    /// First tick of the newest history window that should already be
    /// published for the given live game time.
    pub fn history_window_start(&self, game_time: Tick) -> Tick {
        let start = game_time.saturating_sub(self.config.history_lag_ticks);
        match self.config.history_chunk_ticks {
            0 => start,
            chunk => start - start % chunk,
        }
    }

    // -----------------------------------------------------------------------
    // Batch build
    // -----------------------------------------------------------------------

    /// Replay `history` over `terrain`.
    ///
    /// The base tick is the starting snapshot, not a delta; every later tick
    /// present in the document yields exactly one diff record, up to
    /// `max_frames` of them.
    pub fn build(
        &mut self,
        terrain: &Terrain,
        history: &HistoryDocument,
    ) -> Result<FrameBatch, FrameError> {
        let mut accumulator = SnapshotAccumulator::seed(history.base, history.base_snapshot()?);
        let mut census = TypeCensus::default();
        census.observe(accumulator.view());

        let baseline = self.rasterizer.render(terrain, accumulator.view());
        let mut previous = baseline.clone();
        let mut diffs = Vec::new();
        let mut deltas = history.deltas();
        let slots = deltas.by_ref().take(self.config.max_frames);

        for (index, (tick, delta)) in (0u32..).zip(slots) {
            let view = accumulator.apply(tick, delta)?;
            census.observe(view);

            let current = self.rasterizer.render(terrain, view);
            let record = diff(index, previous.as_slice(), current.as_slice())?;
            debug!(
                "Tick {} -> frame {} with {} changed cell(s)",
                tick,
                index,
                record.len()
            );
            diffs.push(record);
            previous = current;
        }

        let dropped = deltas.count();
        if dropped > 0 {
            warn!(
                "{} tick(s) past the {} device frame slot(s) left out",
                dropped, self.config.max_frames
            );
        }

        let batch = FrameBatch { baseline, diffs };
        self.finish_build(history, accumulator.view(), &census, &batch, dropped);
        Ok(batch)
    }

    /// Decode `raw_terrain` and build in one step.
    pub fn build_from_raw(
        &mut self,
        raw_terrain: &str,
        history: &HistoryDocument,
    ) -> Result<FrameBatch, FrameError> {
        let terrain = self.decode_terrain(raw_terrain)?;
        self.build(&terrain, history)
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    /// Summary of the most recent successful build.
    pub fn stats(&self) -> FrameStats {
        self.stats.clone()
    }

    pub fn builds(&self) -> u64 {
        self.builds
    }

    fn finish_build(
        &mut self,
        history: &HistoryDocument,
        view: &ObjectView,
        census: &TypeCensus,
        batch: &FrameBatch,
        dropped: usize,
    ) {
        let palette = self.rasterizer.mapper().palette();
        let unresolved: Vec<String> = census
            .types()
            .filter(|t| palette.color(t).is_none() && !palette.is_suppressed(t))
            .map(str::to_owned)
            .collect();
        for type_name in &unresolved {
            warn!("No color for object type '{}', drawn as hostile", type_name);
        }
        debug!("Object types seen: {:?}", census.first_seen);

        self.builds += 1;
        self.stats = FrameStats {
            base_tick: history.base,
            ticks_replayed: batch.diffs.len(),
            ticks_dropped: dropped,
            objects_in_view: view.len(),
            changed_cells: batch.changed_cells(),
            unresolved_types: unresolved,
        };

        info!(
            "Built {} frame(s) for {} from tick {} ({} object(s), {} changed cell(s))",
            batch.message_count(),
            history.room.as_deref().unwrap_or("room"),
            history.base,
            self.stats.objects_in_view,
            self.stats.changed_cells,
        );
    }
}

impl Default for FrameService {
    fn default() -> Self {
        Self::new(FrameServiceConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Type census
// ---------------------------------------------------------------------------

/// First-seen attributes of every object type in a replay, to help pick
/// colors for types the palette does not know yet.
#[derive(Debug, Default)]
struct TypeCensus {
    first_seen: BTreeMap<String, ObjectAttributes>,
}

impl TypeCensus {
    fn observe(&mut self, view: &ObjectView) {
        for (_, attributes) in view.iter() {
            if let Some(type_name) = attributes.object_type() {
                if !self.first_seen.contains_key(type_name) {
                    self.first_seen
                        .insert(type_name.to_owned(), attributes.clone());
                }
            }
        }
    }

    fn types(&self) -> impl Iterator<Item = &str> {
        self.first_seen.keys().map(String::as_str)
    }
}

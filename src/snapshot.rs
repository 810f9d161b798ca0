//! Snapshot accumulation: replaying sparse per-tick deltas into a full view
//! of every object seen so far.

use crate::error::FrameError;
use crate::types::{ObjectAttributes, Tick, TickDelta};
use indexmap::IndexMap;
use log::debug;

// ---------------------------------------------------------------------------
// Object view
// ---------------------------------------------------------------------------

/// Last known attributes of every object, in first-appearance order.
///
/// Never shrinks: an id that stops appearing keeps its last known state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectView {
    objects: IndexMap<String, ObjectAttributes>,
}

impl ObjectView {
    /// Copy the base tick's full snapshot into a fresh view.
    pub fn seed(snapshot: &TickDelta) -> Self {
        let mut view = Self::default();
        view.apply_delta(snapshot);
        view
    }

    /// Unknown ids are inserted whole; known ids only have the named
    /// properties overwritten.
    pub fn apply_delta(&mut self, delta: &TickDelta) {
        for (id, patch) in delta {
            let Some(patch) = patch else {
                continue;
            };
            match self.objects.get_mut(id) {
                Some(existing) => existing.patch(patch),
                None => {
                    self.objects.insert(id.clone(), patch.clone());
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ObjectAttributes> {
        self.objects.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectAttributes)> {
        self.objects.iter().map(|(id, attrs)| (id.as_str(), attrs))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Owns the view for one replay session and enforces tick ordering.
#[derive(Debug)]
pub struct SnapshotAccumulator {
    view: ObjectView,
    last_tick: Tick,
}

impl SnapshotAccumulator {
    pub fn seed(base_tick: Tick, snapshot: &TickDelta) -> Self {
        let view = ObjectView::seed(snapshot);
        debug!("Seeded view at tick {} with {} object(s)", base_tick, view.len());
        Self {
            view,
            last_tick: base_tick,
        }
    }

    /// Apply the delta recorded at `tick`.  Ticks may skip numbers but must
    /// strictly increase.
    pub fn apply(&mut self, tick: Tick, delta: &TickDelta) -> Result<&ObjectView, FrameError> {
        if tick <= self.last_tick {
            return Err(FrameError::OutOfOrderTick {
                tick,
                last: self.last_tick,
            });
        }
        self.view.apply_delta(delta);
        self.last_tick = tick;
        Ok(&self.view)
    }

    pub fn view(&self) -> &ObjectView {
        &self.view
    }

    pub fn last_tick(&self) -> Tick {
        self.last_tick
    }
}

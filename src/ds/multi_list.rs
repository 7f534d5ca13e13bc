//! Fixed set of [`IntrusiveList`]s indexed by lane.
//!
//! The container keeps one lane per segment (Tiny, Probation, Main) and
//! frequently needs the combined size; `MultiList` centralizes that
//! accounting. Lane indices are plain `usize` so the data structure stays
//! policy-agnostic.

use crate::ds::intrusive_list::IntrusiveList;

/// A vector of independent lists with combined size accounting.
#[derive(Debug)]
pub struct MultiList<H> {
    lanes: Vec<IntrusiveList<H>>,
}

impl<H> MultiList<H> {
    /// Creates `lanes` empty lists.
    pub fn new(lanes: usize) -> Self {
        Self {
            lanes: (0..lanes).map(|_| IntrusiveList::new()).collect(),
        }
    }

    /// Number of lanes.
    pub fn lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Shared access to one lane.
    ///
    /// # Panics
    ///
    /// Panics if `lane` is out of range.
    pub fn lane(&self, lane: usize) -> &IntrusiveList<H> {
        &self.lanes[lane]
    }

    /// Mutable access to one lane.
    ///
    /// # Panics
    ///
    /// Panics if `lane` is out of range.
    pub fn lane_mut(&mut self, lane: usize) -> &mut IntrusiveList<H> {
        &mut self.lanes[lane]
    }

    /// Total number of nodes across all lanes.
    pub fn len(&self) -> usize {
        self.lanes.iter().map(IntrusiveList::len).sum()
    }

    /// Returns `true` if every lane is empty.
    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(IntrusiveList::is_empty)
    }

    /// Clears every lane.
    pub fn clear(&mut self) {
        for lane in &mut self.lanes {
            lane.clear();
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        for lane in &self.lanes {
            lane.debug_validate_invariants();
        }
    }
}

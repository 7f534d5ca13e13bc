//! Lock-holding eviction iterator.
//!
//! Merges reverse walks over the three segments into a single cursor that
//! yields the least valuable entry first. The iterator owns the container
//! lock for its entire lifetime, so the order it observes cannot shift
//! under it; at most one iterator can exist per container at a time, and
//! constructing a second one blocks (or deadlocks on the same thread) until
//! the first releases the lock.
//!
//! ## Merge rule
//!
//! ```text
//!            Tiny tail        Probation tail       Main tail
//!               │                   │                  │
//!               └──────┬────────────┘                  │
//!                      ▼                               │
//!        admission arbiter: Tiny candidate wins        │
//!        unless its frequency beats Probation's        │
//!        (then the Probation tail goes first)          │
//!                      │                               │
//!                      └───────────── Main only after ─┘
//!                                     both are drained
//! ```
//!
//! Tiny and Probation hold the low-value candidates; Main holds protected
//! entries and is only touched once the first two are exhausted. Forward
//! advance only; there is no way to step the cursor backwards.

use crate::container::{Container, ContainerState, Segment};
use crate::ds::intrusive_list::SlotId;
use crate::node::LfuNode;
use parking_lot::MutexGuard;
use std::sync::Arc;

/// Merged reverse cursor over the three segments, holding the container
/// lock.
///
/// Obtained from [`Container::eviction_iterator`] or
/// [`Container::with_eviction_iterator`]. Dropping the iterator (or calling
/// [`destroy`](Self::destroy)) releases the lock.
pub struct EvictionIterator<'a, T: LfuNode> {
    container: &'a Container<T>,
    guard: Option<MutexGuard<'a, ContainerState<T>>>,
    tiny: Option<SlotId>,
    probation: Option<SlotId>,
    main: Option<SlotId>,
}

impl<'a, T: LfuNode> EvictionIterator<'a, T> {
    pub(crate) fn new(container: &'a Container<T>) -> Self {
        let guard = container.state.lock();
        let tiny = guard.lists.lane(Segment::Tiny.lane()).tail();
        let probation = guard.lists.lane(Segment::Probation.lane()).tail();
        let main = guard.lists.lane(Segment::Main.lane()).tail();
        Self {
            container,
            guard: Some(guard),
            tiny,
            probation,
            main,
        }
    }

    /// The segment and node the cursor currently selects.
    fn selected(&self) -> Option<(Segment, SlotId)> {
        let state = self.guard.as_deref()?;
        match (self.tiny, self.probation, self.main) {
            (None, None, None) => None,
            (Some(t), None, None) => Some((Segment::Tiny, t)),
            (None, Some(p), None) => Some((Segment::Probation, p)),
            (None, None, Some(m)) => Some((Segment::Main, m)),
            (Some(t), None, Some(_)) => Some((Segment::Tiny, t)),
            (None, Some(p), Some(_)) => Some((Segment::Probation, p)),
            (Some(t), Some(p), _) => {
                let tiny = state
                    .lists
                    .lane(Segment::Tiny.lane())
                    .get(t)
                    .expect("stale tiny cursor");
                let probation = state
                    .lists
                    .lane(Segment::Probation.lane())
                    .get(p)
                    .expect("stale probation cursor");
                if !state.admit_to_probation(tiny, probation) {
                    Some((Segment::Tiny, t))
                } else {
                    Some((Segment::Probation, p))
                }
            },
        }
    }

    /// The current best eviction candidate, or `None` when exhausted.
    pub fn current(&self) -> Option<&T> {
        let (segment, id) = self.selected()?;
        let state = self.guard.as_deref()?;
        state.lists.lane(segment.lane()).get(id).map(Arc::as_ref)
    }

    /// The segment of the current candidate.
    pub fn current_segment(&self) -> Option<Segment> {
        self.selected().map(|(segment, _)| segment)
    }

    /// Steps the cursor past the current candidate.
    pub fn advance(&mut self) {
        let Some((segment, id)) = self.selected() else {
            return;
        };
        let state = self.guard.as_deref().expect("selected implies a guard");
        let next = state.lists.lane(segment.lane()).prev(id);
        match segment {
            Segment::Tiny => self.tiny = next,
            Segment::Probation => self.probation = next,
            Segment::Main => self.main = next,
        }
    }

    /// Evicts the current candidate: advances the cursor past it, unlinks
    /// it from the container, and returns the handle so the caller can free
    /// the entry. Returns `None` when exhausted.
    pub fn remove_current(&mut self) -> Option<Arc<T>> {
        let (segment, id) = self.selected()?;
        let node = {
            let state = self.guard.as_deref()?;
            state.lists.lane(segment.lane()).get(id)?.clone()
        };
        self.advance();
        let state = self.guard.as_mut()?;
        state.remove_entry(node.as_ref());
        Some(node)
    }

    /// Returns `true` when no candidates remain.
    pub fn is_exhausted(&self) -> bool {
        self.selected().is_none()
    }

    /// Invalidates the cursor and releases the container lock early.
    ///
    /// Other container operations can proceed after this; the iterator
    /// itself only becomes usable again via [`reset_to_begin`](Self::reset_to_begin).
    pub fn destroy(&mut self) {
        self.tiny = None;
        self.probation = None;
        self.main = None;
        self.guard = None;
    }

    /// Re-acquires the lock if necessary and rewinds all three cursors to
    /// the segment tails.
    pub fn reset_to_begin(&mut self) {
        if self.guard.is_none() {
            self.guard = Some(self.container.state.lock());
        }
        let state = self.guard.as_deref().expect("guard just ensured");
        self.tiny = state.lists.lane(Segment::Tiny.lane()).tail();
        self.probation = state.lists.lane(Segment::Probation.lane()).tail();
        self.main = state.lists.lane(Segment::Main.lane()).tail();
    }
}

impl<'a, T: LfuNode> PartialEq for EvictionIterator<'a, T> {
    /// Two iterator states are equal when they belong to the same container
    /// and all three cursors agree.
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.container, other.container)
            && self.tiny == other.tiny
            && self.probation == other.probation
            && self.main == other.main
    }
}

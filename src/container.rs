//! W-TinyLFU memory-management container.
//!
//! Tracks externally-owned cache entries across three LRU segments and
//! surfaces them in eviction priority order. Admission at the segment
//! boundaries is arbitrated by an approximate frequency estimate so that a
//! burst of one-time keys cannot flush the resident working set.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Container<T> layout                           │
//! │                                                                      │
//! │   TINY (≈1%)              PROBATION                MAIN (protected)  │
//! │   head ──── tail          head ──── tail           head ──── tail    │
//! │    new        │            │          │              hot       │     │
//! │    inserts    │            │          │                        │     │
//! │               ▼            ▼          ▼                        ▼     │
//! │        admission       demotion   eviction                demotion   │
//! │        arbiter         target     candidate               to         │
//! │        (freq vs                                           probation  │
//! │         probation tail)                                   tail       │
//! │                                                                      │
//! │   CountMinSketch access_freq: bumped on add + record_access,         │
//! │   halved every max_window_size updates                               │
//! └──────────────────────────────────────────────────────────────────────┘
//!
//! Entry flow
//! ──────────
//!   add:            link at Tiny head. Tiny over its cap ⇒ demote Tiny
//!                   tail to Probation head; otherwise the Tiny tail may
//!                   swap with the Probation tail when its frequency wins.
//!   record_access:  move to own segment head; a Probation entry whose
//!                   frequency clears protection_freq moves to Main, and
//!                   Main overflow demotes its tail to Probation's tail.
//!   eviction:       EvictionIterator merges the three reverse walks,
//!                   weakest candidate first; Main only after Tiny and
//!                   Probation are drained.
//! ```
//!
//! All mutations are serialized under one mutex; the `record_access` fast
//! path reads the entry's flags and update time outside the lock and drops
//! the update when it would be redundant within the refresh window.

use crate::config::{AccessMode, Config};
use crate::ds::count_min_sketch::CountMinSketch;
use crate::ds::intrusive_list::SlotId;
use crate::ds::multi_list::MultiList;
use crate::error::{ConfigError, InvariantError, RestoreError};
use crate::eviction::EvictionIterator;
use crate::node::{LfuHook, LfuNode};
use crate::time::{Clock, SystemClock};
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Initial capacity estimate used to size the sketch before anything is
/// inserted.
const DEFAULT_CAPACITY: usize = 100;

/// Number of sketch rows.
const HASH_COUNT: usize = 4;

/// Error tolerance divisor for sketch sizing: counters per row is roughly
/// `e * max_window_size / ERROR_THRESHOLD`, rounded up to a power of two.
const ERROR_THRESHOLD: usize = 5;

/// Counter scale factor applied at each window boundary.
const DECAY_FACTOR: f64 = 0.5;

/// Upper bound on the computed refresh time, in seconds.
const LRU_REFRESH_TIME_CAP: u32 = 900;

/// Sentinel deadline meaning reconfiguration never runs.
const NEVER_RECONFIGURE: u32 = u32::MAX;

/// Hashes an entry key for the frequency sketch.
#[inline]
pub(crate) fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(key);
    hasher.finish()
}

/// The three recency segments.
///
/// Each segment is an independent LRU: most recently promoted at the head,
/// eviction candidate at the tail. An entry's segment is determined solely
/// by its hook flags; Main is the absence of both segment bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Admission window for new entries.
    Tiny,
    /// Unproven entries promoted out of Tiny.
    Probation,
    /// Protected long-term segment.
    Main,
}

impl Segment {
    pub(crate) const COUNT: usize = 3;

    #[inline]
    pub(crate) fn lane(self) -> usize {
        match self {
            Segment::Tiny => 0,
            Segment::Probation => 1,
            Segment::Main => 2,
        }
    }

    #[inline]
    pub(crate) fn of_hook(hook: &LfuHook) -> Segment {
        if hook.is_tiny() {
            Segment::Tiny
        } else if hook.is_probation() {
            Segment::Probation
        } else {
            Segment::Main
        }
    }
}

/// Point-in-time container statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStats {
    /// Total tracked entries across all segments.
    pub size: usize,
    /// Update time of the current eviction-order tail, 0 when empty.
    pub oldest_update_time: u32,
    /// The effective promotion refresh interval in seconds.
    pub lru_refresh_time: u32,
}

/// Age statistics over the protected segment, used by the allocator to
/// project how old evicted entries would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionAgeStat {
    /// Age in seconds of the Main tail (0 when Main is empty).
    pub oldest_element_age: u32,
    /// Age of the entry `projected_evictions` positions from the Main tail,
    /// falling back to the oldest age when Main is shorter than that.
    pub projected_age: u32,
    /// Current length of the Main segment.
    pub main_len: usize,
}

/// Opaque snapshot of a container: configuration plus per-segment key order.
///
/// The frequency sketch is intentionally not captured; restoration rebuilds
/// it empty and lets it re-learn, the same compromise the container makes
/// when growing the sketch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SavedState {
    /// Configuration at save time.
    pub config: Config,
    /// Effective refresh time at save time.
    pub lru_refresh_time: u32,
    /// Tiny segment keys, head to tail.
    pub tiny: Vec<Vec<u8>>,
    /// Probation segment keys, head to tail.
    pub probation: Vec<Vec<u8>>,
    /// Main segment keys, head to tail.
    pub main: Vec<Vec<u8>>,
}

/// Everything guarded by the container mutex.
pub(crate) struct ContainerState<T: LfuNode> {
    pub(crate) lists: MultiList<Arc<T>>,
    pub(crate) access_freq: CountMinSketch,
    window_size: u64,
    max_window_size: u64,
    /// The capacity the sketch was last sized for. Grows monotonically.
    capacity: usize,
    pub(crate) config: Config,
}

impl<T: LfuNode> ContainerState<T> {
    /// True iff the Tiny candidate's estimated frequency beats the Probation
    /// candidate's. Ties go to the newcomer when so configured.
    pub(crate) fn admit_to_probation(&self, tiny: &T, probation: &T) -> bool {
        let tiny_freq = self.access_freq.count(hash_key(tiny.key()));
        let probation_freq = self.access_freq.count(hash_key(probation.key()));
        if self.config.newcomer_wins_on_tie {
            tiny_freq >= probation_freq
        } else {
            tiny_freq > probation_freq
        }
    }

    /// Bumps the frequency for `hash` and halves all counters when the
    /// window fills. Halving (rather than resetting) the window counter
    /// smooths the decay cadence after a burst.
    fn update_frequencies(&mut self, hash: u64) {
        self.access_freq.increment(hash);
        self.window_size += 1;
        if self.window_size == self.max_window_size {
            self.window_size >>= 1;
            self.access_freq.decay_counts_by(DECAY_FACTOR);
            trace!(
                window = self.max_window_size,
                "halved frequency counters at window boundary"
            );
        }
    }

    /// Re-sizes the sketch when the container has outgrown it.
    ///
    /// Counter history is discarded on growth; the sketch re-learns within
    /// one window. Never shrinks.
    fn maybe_grow_counters(&mut self) {
        let size = self.lists.len();
        if 2 * self.capacity > size {
            return;
        }

        self.capacity = size.max(DEFAULT_CAPACITY);
        self.window_size = 0;
        self.max_window_size = (self.capacity * self.config.window_to_cache_size_ratio) as u64;

        let num_counters =
            (std::f64::consts::E * self.max_window_size as f64 / ERROR_THRESHOLD as f64) as usize;
        self.access_freq = CountMinSketch::new(num_counters, HASH_COUNT);
        debug!(
            capacity = self.capacity,
            counters = self.access_freq.width(),
            bytes = self.access_freq.byte_size(),
            "resized frequency sketch"
        );
    }

    /// Moves the node at `id` from one segment list to another end of
    /// another (or the same) list, refreshing the hook back-reference.
    fn transfer(&mut self, id: SlotId, from: Segment, to: Segment, at_head: bool) -> Option<SlotId> {
        let node = self.lists.lane_mut(from.lane()).unlink(id)?;
        let hook_ref = node.clone();
        let target = self.lists.lane_mut(to.lane());
        let new_id = if at_head {
            target.link_at_head(node)
        } else {
            target.link_at_tail(node)
        };
        hook_ref.hook().set_slot(new_id);
        Some(new_id)
    }

    /// Arbitrates the Tiny/Probation boundary when neither cap forced a
    /// move: swap the two tails if the Tiny tail's frequency wins,
    /// otherwise rotate the Probation tail to its head so a stubborn
    /// high-frequency resident cannot block admissions forever.
    fn maybe_promote_tail(&mut self) {
        let Some(probation_id) = self.lists.lane(Segment::Probation.lane()).tail() else {
            return;
        };
        let Some(tiny_id) = self.lists.lane(Segment::Tiny.lane()).tail() else {
            return;
        };

        let admit = {
            let tiny = self
                .lists
                .lane(Segment::Tiny.lane())
                .get(tiny_id)
                .expect("tiny tail vanished");
            let probation = self
                .lists
                .lane(Segment::Probation.lane())
                .get(probation_id)
                .expect("probation tail vanished");
            self.admit_to_probation(tiny, probation)
        };

        if admit {
            let tiny = self
                .lists
                .lane(Segment::Tiny.lane())
                .get(tiny_id)
                .expect("tiny tail vanished")
                .clone();
            let probation = self
                .lists
                .lane(Segment::Probation.lane())
                .get(probation_id)
                .expect("probation tail vanished")
                .clone();

            self.transfer(tiny_id, Segment::Tiny, Segment::Probation, true);
            tiny.hook().unmark_tiny();
            tiny.hook().mark_probation();

            self.transfer(probation_id, Segment::Probation, Segment::Tiny, false);
            probation.hook().unmark_probation();
            probation.hook().mark_tiny();
        } else {
            self.lists
                .lane_mut(Segment::Probation.lane())
                .move_to_head(probation_id);
        }
    }

    /// Unlinks `node` from its segment and clears all container-owned hook
    /// state.
    pub(crate) fn remove_entry(&mut self, node: &T) {
        let hook = node.hook();
        let segment = Segment::of_hook(hook);
        if let Some(id) = hook.slot() {
            let removed = self.lists.lane_mut(segment.lane()).unlink(id);
            debug_assert!(
                removed.as_deref().map_or(false, |removed| std::ptr::eq(removed, node)),
                "hook back-reference resolved to a different entry"
            );
        }
        hook.unmark_tiny();
        hook.unmark_probation();
        hook.unmark_accessed();
        hook.unmark_in_container();
        hook.clear_slot();
    }

    /// Age of the Main tail relative to `now`; 0 when Main is empty.
    fn oldest_main_age(&self, now: u32) -> u32 {
        let main = self.lists.lane(Segment::Main.lane());
        main.tail()
            .and_then(|id| main.get(id))
            .map(|node| now.saturating_sub(node.hook().update_time()))
            .unwrap_or(0)
    }
}

/// W-TinyLFU memory-management container over entries of type `T`.
///
/// The container never owns entry payloads: the allocator creates and
/// destroys entries, the container keeps an `Arc` handle per linked entry
/// plus the intrusive hook state on the entry itself. All mutating
/// operations are serialized under one internal mutex and are linearizable
/// with respect to each other; `record_access` can optionally drop updates
/// on lock contention as back-pressure for hot keys.
///
/// At most one [`EvictionIterator`] can exist per container at a time; it
/// holds the container lock for its whole lifetime.
pub struct Container<T: LfuNode> {
    pub(crate) state: Mutex<ContainerState<T>>,
    /// Promotion throttle, read outside the lock on the access fast path.
    /// A heuristic, not a correctness invariant, so relaxed loads suffice.
    lru_refresh_time: AtomicU32,
    /// Next reconfiguration deadline; `NEVER_RECONFIGURE` disables it.
    next_reconfigure_time: AtomicU32,
    update_on_read: AtomicBool,
    update_on_write: AtomicBool,
    try_lock_update: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl<T: LfuNode> Container<T> {
    /// Creates a container with the system clock.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a container with an injected seconds source.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut state = ContainerState {
            lists: MultiList::new(Segment::COUNT),
            access_freq: CountMinSketch::new(1, HASH_COUNT),
            window_size: 0,
            max_window_size: 0,
            capacity: 0,
            config,
        };
        state.maybe_grow_counters();

        let next_reconfigure = if state.config.mm_reconfigure_interval_secs == 0 {
            NEVER_RECONFIGURE
        } else {
            clock
                .now_secs()
                .saturating_add(state.config.mm_reconfigure_interval_secs)
        };

        Ok(Self {
            lru_refresh_time: AtomicU32::new(state.config.default_lru_refresh_time),
            next_reconfigure_time: AtomicU32::new(next_reconfigure),
            update_on_read: AtomicBool::new(state.config.update_on_read),
            update_on_write: AtomicBool::new(state.config.update_on_write),
            try_lock_update: AtomicBool::new(state.config.try_lock_update),
            state: Mutex::new(state),
            clock,
        })
    }

    /// Adds `node` at the head of the Tiny segment.
    ///
    /// Returns `false` if the entry is already in the container, leaving it
    /// unchanged. On success the entry's frequency is bumped, the Tiny cap
    /// is enforced (overflow demotes the Tiny tail into Probation,
    /// otherwise the tail swap arbitration runs), and the sketch may grow.
    pub fn add(&self, node: Arc<T>) -> bool {
        let now = self.clock.now_secs();
        let mut state = self.state.lock();

        let hook = node.hook();
        if hook.is_in_container() {
            return false;
        }

        let hash = hash_key(node.key());
        let id = state
            .lists
            .lane_mut(Segment::Tiny.lane())
            .link_at_head(node.clone());
        hook.set_slot(id);
        hook.mark_tiny();
        state.update_frequencies(hash);

        // Tiny cap relative to the whole container, including this entry.
        let expected = state.config.tiny_size_percent * state.lists.len() / 100;
        if state.lists.lane(Segment::Tiny.lane()).len() > expected {
            if let Some(tail_id) = state.lists.lane(Segment::Tiny.lane()).tail() {
                let tail = state
                    .lists
                    .lane(Segment::Tiny.lane())
                    .get(tail_id)
                    .expect("tiny tail vanished")
                    .clone();
                state.transfer(tail_id, Segment::Tiny, Segment::Probation, true);
                tail.hook().unmark_tiny();
                tail.hook().mark_probation();
            }
        } else {
            state.maybe_promote_tail();
        }

        state.maybe_grow_counters();

        hook.mark_in_container();
        hook.set_update_time(now);
        hook.unmark_accessed();
        true
    }

    /// Unlinks `node` from the container.
    ///
    /// Returns `false` if the entry is not in the container.
    pub fn remove(&self, node: &T) -> bool {
        let mut state = self.state.lock();
        if !node.hook().is_in_container() {
            return false;
        }
        state.remove_entry(node);
        true
    }

    /// Replaces `old` with `new` at the same list position.
    ///
    /// `new` takes over `old`'s segment, neighbors, update time, and
    /// accessed bit. Fails when `old` is not in the container, `new`
    /// already is, or `new` carries stale segment flags.
    pub fn replace(&self, old: &T, new: Arc<T>) -> bool {
        let mut state = self.state.lock();

        let old_hook = old.hook();
        let new_hook = new.hook();
        if new_hook.is_tiny() || new_hook.is_probation() {
            return false;
        }
        if !old_hook.is_in_container() || new_hook.is_in_container() {
            return false;
        }
        let Some(id) = old_hook.slot() else {
            return false;
        };

        let segment = Segment::of_hook(old_hook);
        state
            .lists
            .lane_mut(segment.lane())
            .replace(id, new.clone());
        new_hook.set_slot(id);

        match segment {
            Segment::Tiny => {
                old_hook.unmark_tiny();
                new_hook.mark_tiny();
            },
            Segment::Probation => {
                old_hook.unmark_probation();
                new_hook.mark_probation();
            },
            Segment::Main => {},
        }

        new_hook.set_update_time(old_hook.update_time());
        if old_hook.is_accessed() {
            new_hook.mark_accessed();
        } else {
            new_hook.unmark_accessed();
        }
        old_hook.unmark_in_container();
        old_hook.clear_slot();
        new_hook.mark_in_container();
        true
    }

    /// Records an access against `node`, possibly promoting it.
    ///
    /// Returns `true` iff the entry was moved. The call is a no-op when the
    /// mode is disabled by configuration, when the entry is outside the
    /// container, when the entry was already refreshed within
    /// `lru_refresh_time` seconds (and has its accessed bit), or, in
    /// try-lock mode, when the container lock is contended.
    pub fn record_access(&self, node: &T, mode: AccessMode) -> bool {
        let enabled = match mode {
            AccessMode::Read => self.update_on_read.load(Ordering::Relaxed),
            AccessMode::Write => self.update_on_write.load(Ordering::Relaxed),
        };
        if !enabled {
            return false;
        }

        let now = self.clock.now_secs();
        let hook = node.hook();
        let refresh = self.lru_refresh_time.load(Ordering::Relaxed);
        let due = now >= hook.update_time().saturating_add(refresh) || !hook.is_accessed();
        if !(hook.is_in_container() && due) {
            return false;
        }

        if !hook.is_accessed() {
            hook.mark_accessed();
        }

        let mut state = if self.try_lock_update.load(Ordering::Relaxed) {
            match self.state.try_lock() {
                Some(guard) => guard,
                None => return false,
            }
        } else {
            self.state.lock()
        };

        self.reconfigure_locked(&state, now);

        // The entry may have been removed while we waited for the lock.
        if !hook.is_in_container() {
            return false;
        }
        let Some(id) = hook.slot() else {
            return false;
        };

        let hash = hash_key(node.key());
        let segment = Segment::of_hook(hook);
        state.lists.lane_mut(segment.lane()).move_to_head(id);

        if segment == Segment::Probation && state.access_freq.count(hash) > state.config.protection_freq
        {
            state.transfer(id, Segment::Probation, Segment::Main, true);
            hook.unmark_probation();

            // Demote Main overflow to Probation's tail, not its head:
            // fresh probation entries should not pay for the promotion.
            loop {
                let main_len = state.lists.lane(Segment::Main.lane()).len();
                let total = main_len + state.lists.lane(Segment::Probation.lane()).len();
                let expected = state.config.protection_segment_size_pct * total / 100;
                if main_len <= expected {
                    break;
                }
                let Some(tail_id) = state.lists.lane(Segment::Main.lane()).tail() else {
                    break;
                };
                let tail = state
                    .lists
                    .lane(Segment::Main.lane())
                    .get(tail_id)
                    .expect("main tail vanished")
                    .clone();
                state.transfer(tail_id, Segment::Main, Segment::Probation, false);
                tail.hook().mark_probation();
            }
        }

        hook.set_update_time(now);
        state.update_frequencies(hash);
        true
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.state.lock().lists.len()
    }

    /// Returns `true` if no entries are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The segment `node` currently occupies, from its hook flags alone.
    pub fn segment_of(&self, node: &T) -> Option<Segment> {
        let hook = node.hook();
        if !hook.is_in_container() {
            return None;
        }
        Some(Segment::of_hook(hook))
    }

    /// Memory footprint of the frequency sketch in bytes.
    pub fn counter_size(&self) -> usize {
        self.state.lock().access_freq.byte_size()
    }

    /// Estimated access frequency for `key` from the sketch.
    ///
    /// Diagnostic surface; estimates over-approximate and decay over time.
    pub fn access_frequency(&self, key: &[u8]) -> u64 {
        let state = self.state.lock();
        state.access_freq.count(hash_key(key))
    }

    /// A copy of the current configuration.
    pub fn config(&self) -> Config {
        self.state.lock().config.clone()
    }

    /// Replaces the configuration at runtime.
    ///
    /// Re-derives the access gates, refresh time, and reconfiguration
    /// deadline. Segment membership of existing entries is not revisited.
    pub fn set_config(&self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        let mut state = self.state.lock();
        self.lru_refresh_time
            .store(config.default_lru_refresh_time, Ordering::Relaxed);
        let next_reconfigure = if config.mm_reconfigure_interval_secs == 0 {
            NEVER_RECONFIGURE
        } else {
            self.clock
                .now_secs()
                .saturating_add(config.mm_reconfigure_interval_secs)
        };
        self.next_reconfigure_time
            .store(next_reconfigure, Ordering::Relaxed);
        self.update_on_read
            .store(config.update_on_read, Ordering::Relaxed);
        self.update_on_write
            .store(config.update_on_write, Ordering::Relaxed);
        self.try_lock_update
            .store(config.try_lock_update, Ordering::Relaxed);
        state.config = config;
        Ok(())
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> ContainerStats {
        let state = self.state.lock();
        let oldest_update_time = [Segment::Main, Segment::Probation, Segment::Tiny]
            .into_iter()
            .find_map(|segment| {
                let lane = state.lists.lane(segment.lane());
                lane.tail()
                    .and_then(|id| lane.get(id))
                    .map(|node| node.hook().update_time())
            })
            .unwrap_or(0);
        ContainerStats {
            size: state.lists.len(),
            oldest_update_time,
            lru_refresh_time: self.lru_refresh_time.load(Ordering::Relaxed),
        }
    }

    /// Age statistics over the Main segment given a projected number of
    /// future evictions.
    pub fn eviction_age_stats(&self, projected_evictions: u64) -> EvictionAgeStat {
        let state = self.state.lock();
        let now = self.clock.now_secs();
        Self::eviction_age_stats_locked(&state, now, projected_evictions)
    }

    fn eviction_age_stats_locked(
        state: &ContainerState<T>,
        now: u32,
        projected_evictions: u64,
    ) -> EvictionAgeStat {
        let main = state.lists.lane(Segment::Main.lane());
        let oldest_element_age = state.oldest_main_age(now);

        let mut cursor = main.tail();
        let mut seen = 0u64;
        while seen < projected_evictions {
            match cursor {
                Some(id) => {
                    cursor = main.prev(id);
                    seen += 1;
                },
                None => break,
            }
        }
        let projected_age = cursor
            .and_then(|id| main.get(id))
            .map(|node| now.saturating_sub(node.hook().update_time()))
            .unwrap_or(oldest_element_age);

        EvictionAgeStat {
            oldest_element_age,
            projected_age,
            main_len: main.len(),
        }
    }

    /// Recomputes the refresh time from the Main tail's age, at most once
    /// per configured interval.
    fn reconfigure_locked(&self, state: &ContainerState<T>, now: u32) {
        if now < self.next_reconfigure_time.load(Ordering::Relaxed) {
            return;
        }
        self.next_reconfigure_time.store(
            now.saturating_add(state.config.mm_reconfigure_interval_secs),
            Ordering::Relaxed,
        );

        let oldest_age = state.oldest_main_age(now);
        let tracked = (f64::from(oldest_age) * state.config.lru_refresh_ratio) as u32;
        let refresh = state
            .config
            .default_lru_refresh_time
            .max(tracked)
            .min(LRU_REFRESH_TIME_CAP);
        self.lru_refresh_time.store(refresh, Ordering::Relaxed);
        debug!(refresh, oldest_age, "recomputed lru refresh time");
    }

    /// Acquires the eviction iterator: the container lock stays held until
    /// the iterator is dropped or destroyed.
    pub fn eviction_iterator(&self) -> EvictionIterator<'_, T> {
        EvictionIterator::new(self)
    }

    /// Runs `f` with an eviction iterator; the lock is released on every
    /// exit path, including panics.
    pub fn with_eviction_iterator<R>(
        &self,
        f: impl FnOnce(&mut EvictionIterator<'_, T>) -> R,
    ) -> R {
        let mut it = self.eviction_iterator();
        f(&mut it)
    }

    /// Runs `f` while holding the container lock.
    pub fn with_container_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.state.lock();
        f()
    }

    /// Captures the configuration and segment orderings.
    ///
    /// The sketch is not captured; a restored container re-learns
    /// frequencies. Serialization must happen without concurrent writers if
    /// the snapshot is to be consistent with the allocator's own state.
    pub fn save_state(&self) -> SavedState {
        let state = self.state.lock();
        let keys_of = |segment: Segment| -> Vec<Vec<u8>> {
            state
                .lists
                .lane(segment.lane())
                .iter()
                .map(|node| node.key().to_vec())
                .collect()
        };
        SavedState {
            config: state.config.clone(),
            lru_refresh_time: self.lru_refresh_time.load(Ordering::Relaxed),
            tiny: keys_of(Segment::Tiny),
            probation: keys_of(Segment::Probation),
            main: keys_of(Segment::Main),
        }
    }

    /// Rebuilds a container from a snapshot, resolving keys back to live
    /// entries through `resolver`. Uses the system clock.
    pub fn restore<F>(saved: SavedState, resolver: F) -> Result<Self, RestoreError>
    where
        F: FnMut(&[u8]) -> Option<Arc<T>>,
    {
        Self::restore_with_clock(saved, resolver, Arc::new(SystemClock))
    }

    /// Rebuilds a container from a snapshot with an injected clock.
    pub fn restore_with_clock<F>(
        saved: SavedState,
        mut resolver: F,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RestoreError>
    where
        F: FnMut(&[u8]) -> Option<Arc<T>>,
    {
        let container = Self::with_clock(saved.config, clock)?;
        {
            let mut state = container.state.lock();
            let segments = [
                (Segment::Tiny, saved.tiny),
                (Segment::Probation, saved.probation),
                (Segment::Main, saved.main),
            ];
            for (segment, keys) in segments {
                for key in keys {
                    let node = resolver(&key).ok_or_else(|| {
                        RestoreError::new(format!("no entry for saved key ({} bytes)", key.len()))
                    })?;
                    let hook_ref = node.clone();
                    let id = state.lists.lane_mut(segment.lane()).link_at_tail(node);
                    let hook = hook_ref.hook();
                    hook.set_slot(id);
                    match segment {
                        Segment::Tiny => {
                            hook.mark_tiny();
                            hook.unmark_probation();
                        },
                        Segment::Probation => {
                            hook.mark_probation();
                            hook.unmark_tiny();
                        },
                        Segment::Main => {
                            hook.unmark_tiny();
                            hook.unmark_probation();
                        },
                    }
                    hook.mark_in_container();
                }
            }
            state.maybe_grow_counters();
        }
        container
            .lru_refresh_time
            .store(saved.lru_refresh_time, Ordering::Relaxed);
        Ok(container)
    }

    /// Verifies container invariants: every linked entry's flags agree with
    /// its segment, its hook back-reference resolves to its own node, and
    /// each lane's chain accounts for its length.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let state = self.state.lock();
        for segment in [Segment::Tiny, Segment::Probation, Segment::Main] {
            let lane = state.lists.lane(segment.lane());
            let mut cursor = lane.head();
            let mut count = 0usize;
            while let Some(id) = cursor {
                let node = lane
                    .get(id)
                    .ok_or_else(|| InvariantError::new("linked slot is empty"))?;
                let hook = node.hook();
                if !hook.is_in_container() {
                    return Err(InvariantError::new(
                        "linked entry missing in-container bit",
                    ));
                }
                if Segment::of_hook(hook) != segment {
                    return Err(InvariantError::new(format!(
                        "entry flags disagree with segment {:?}",
                        segment
                    )));
                }
                if hook.slot() != Some(id) {
                    return Err(InvariantError::new("hook slot does not match list node"));
                }
                count += 1;
                if count > lane.len() {
                    return Err(InvariantError::new("cycle detected in segment list"));
                }
                cursor = lane.next(id);
            }
            if count != lane.len() {
                return Err(InvariantError::new(format!(
                    "segment {:?} length mismatch: walked {}, tracked {}",
                    segment,
                    count,
                    lane.len()
                )));
            }
        }
        Ok(())
    }
}

impl<T: LfuNode> std::fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Container")
            .field("size", &state.lists.len())
            .field("tiny_len", &state.lists.lane(Segment::Tiny.lane()).len())
            .field(
                "probation_len",
                &state.lists.lane(Segment::Probation.lane()).len(),
            )
            .field("main_len", &state.lists.lane(Segment::Main.lane()).len())
            .field("sketch_bytes", &state.access_freq.byte_size())
            .finish_non_exhaustive()
    }
}

//! Entry contract: the intrusive hook and the `LfuNode` trait.
//!
//! Entries are created and destroyed by the surrounding allocator, never by
//! the container. The container's only footprint on an entry is the embedded
//! [`LfuHook`]: a slot back-reference into the container's node arena, a
//! 32-bit update time in seconds, and one flag byte. The allocator must
//! treat the hook as opaque and must not reuse its bits.
//!
//! ## Flag layout
//!
//! ```text
//!   bit 0  TINY          entry is linked in the Tiny segment
//!   bit 1  ACCESSED      entry has been accessed since insertion
//!   bit 2  PROBATION     entry is linked in the Probation segment
//!   bit 3  IN_CONTAINER  entry is linked in exactly one segment
//! ```
//!
//! An entry with neither TINY nor PROBATION set while IN_CONTAINER is in the
//! Main (protected) segment.
//!
//! All hook state is atomic: the accessed bit and update time are consulted
//! outside the container lock on the `record_access` fast path; the slot
//! back-reference is only touched under the lock.

use crate::ds::intrusive_list::SlotId;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

const FLAG_TINY: u8 = 1 << 0;
const FLAG_ACCESSED: u8 = 1 << 1;
const FLAG_PROBATION: u8 = 1 << 2;
const FLAG_IN_CONTAINER: u8 = 1 << 3;

const NO_SLOT: usize = usize::MAX;

/// An entry that can be tracked by the container.
///
/// The key must be stable for the entry's lifetime; it is hashed on every
/// frequency update. The hook must be embedded in the entry (one hook per
/// entry, one container per hook).
pub trait LfuNode {
    /// The entry's stable key bytes.
    fn key(&self) -> &[u8];

    /// The container-reserved intrusive hook.
    fn hook(&self) -> &LfuHook;
}

/// Container-reserved state embedded in each entry.
///
/// # Example
///
/// ```
/// use wtinylfu::{LfuHook, LfuNode};
///
/// struct Entry {
///     key: Vec<u8>,
///     hook: LfuHook,
/// }
///
/// impl LfuNode for Entry {
///     fn key(&self) -> &[u8] {
///         &self.key
///     }
///     fn hook(&self) -> &LfuHook {
///         &self.hook
///     }
/// }
///
/// let entry = Entry {
///     key: b"k".to_vec(),
///     hook: LfuHook::new(),
/// };
/// assert!(!entry.hook().is_in_container());
/// ```
#[derive(Debug)]
pub struct LfuHook {
    /// Back-reference into the container's node arena; `NO_SLOT` when the
    /// entry is not linked.
    slot: AtomicUsize,
    /// Seconds timestamp of the last position update.
    update_time: AtomicU32,
    flags: AtomicU8,
}

impl LfuHook {
    /// Creates an unlinked hook with all flags clear.
    pub const fn new() -> Self {
        Self {
            slot: AtomicUsize::new(NO_SLOT),
            update_time: AtomicU32::new(0),
            flags: AtomicU8::new(0),
        }
    }

    /// Seconds timestamp of the entry's last position update.
    #[inline]
    pub fn update_time(&self) -> u32 {
        self.update_time.load(Ordering::Relaxed)
    }

    /// Whether the entry is currently linked into a container segment.
    #[inline]
    pub fn is_in_container(&self) -> bool {
        self.is_set(FLAG_IN_CONTAINER)
    }

    /// Whether the entry is in the Tiny segment.
    #[inline]
    pub fn is_tiny(&self) -> bool {
        self.is_set(FLAG_TINY)
    }

    /// Whether the entry is in the Probation segment.
    #[inline]
    pub fn is_probation(&self) -> bool {
        self.is_set(FLAG_PROBATION)
    }

    /// Whether the entry has been accessed since insertion.
    #[inline]
    pub fn is_accessed(&self) -> bool {
        self.is_set(FLAG_ACCESSED)
    }

    #[inline]
    fn is_set(&self, flag: u8) -> bool {
        self.flags.load(Ordering::Relaxed) & flag != 0
    }

    #[inline]
    fn set_flag(&self, flag: u8) {
        self.flags.fetch_or(flag, Ordering::Relaxed);
    }

    #[inline]
    fn clear_flag(&self, flag: u8) {
        self.flags.fetch_and(!flag, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn mark_tiny(&self) {
        self.set_flag(FLAG_TINY);
    }

    #[inline]
    pub(crate) fn unmark_tiny(&self) {
        self.clear_flag(FLAG_TINY);
    }

    #[inline]
    pub(crate) fn mark_probation(&self) {
        self.set_flag(FLAG_PROBATION);
    }

    #[inline]
    pub(crate) fn unmark_probation(&self) {
        self.clear_flag(FLAG_PROBATION);
    }

    #[inline]
    pub(crate) fn mark_accessed(&self) {
        self.set_flag(FLAG_ACCESSED);
    }

    #[inline]
    pub(crate) fn unmark_accessed(&self) {
        self.clear_flag(FLAG_ACCESSED);
    }

    #[inline]
    pub(crate) fn mark_in_container(&self) {
        self.set_flag(FLAG_IN_CONTAINER);
    }

    #[inline]
    pub(crate) fn unmark_in_container(&self) {
        self.clear_flag(FLAG_IN_CONTAINER);
    }

    #[inline]
    pub(crate) fn set_update_time(&self, secs: u32) {
        self.update_time.store(secs, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn slot(&self) -> Option<SlotId> {
        match self.slot.load(Ordering::Relaxed) {
            NO_SLOT => None,
            idx => Some(SlotId(idx)),
        }
    }

    #[inline]
    pub(crate) fn set_slot(&self, id: SlotId) {
        self.slot.store(id.index(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn clear_slot(&self) {
        self.slot.store(NO_SLOT, Ordering::Relaxed);
    }
}

impl Default for LfuHook {
    fn default() -> Self {
        Self::new()
    }
}

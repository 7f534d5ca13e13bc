//! wtinylfu: W-TinyLFU eviction container primitives for in-process cache
//! allocators.
//!
//! The [`Container`] tracks externally-owned entries across three LRU
//! segments (Tiny admission window, Probation, protected Main), arbitrates
//! admissions with a [Count-Min sketch](ds::count_min_sketch::CountMinSketch)
//! of access frequencies, and exposes an [`EvictionIterator`] that yields
//! entries in eviction priority order under the container lock. See
//! `DESIGN.md` for internal architecture and invariants.
//!
//! The container never stores payloads and never allocates entries; the
//! surrounding allocator owns both and embeds an [`LfuHook`] in each entry
//! for the container's use.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wtinylfu::{AccessMode, Config, Container, LfuHook, LfuNode};
//!
//! struct Entry {
//!     key: Vec<u8>,
//!     hook: LfuHook,
//! }
//!
//! impl LfuNode for Entry {
//!     fn key(&self) -> &[u8] {
//!         &self.key
//!     }
//!     fn hook(&self) -> &LfuHook {
//!         &self.hook
//!     }
//! }
//!
//! let container = Container::new(Config::default()).unwrap();
//!
//! let entry = Arc::new(Entry {
//!     key: b"user:42".to_vec(),
//!     hook: LfuHook::new(),
//! });
//! assert!(container.add(entry.clone()));
//! container.record_access(&entry, AccessMode::Read);
//!
//! // Under memory pressure, evict from the front of the merged walk.
//! let evicted = container.with_eviction_iterator(|it| it.remove_current());
//! assert!(evicted.is_some());
//! assert!(container.is_empty());
//! ```

pub mod config;
pub mod container;
pub mod ds;
pub mod error;
pub mod eviction;
pub mod node;
pub mod time;

pub use config::{AccessMode, Config};
pub use container::{Container, ContainerStats, EvictionAgeStat, SavedState, Segment};
pub use error::{ConfigError, InvariantError, RestoreError};
pub use eviction::EvictionIterator;
pub use node::{LfuHook, LfuNode};
pub use time::{Clock, ManualClock, SystemClock};

//! Container configuration.
//!
//! All tuning knobs for the W-TinyLFU container live in [`Config`]. Values
//! are plain public fields constructed with struct-update syntax over
//! [`Config::default`]; [`Config::validate`] rejects out-of-range values at
//! container construction time.
//!
//! | Field | Default | Range | Effect |
//! |-------|---------|-------|--------|
//! | `default_lru_refresh_time` | 60 s | - | Lower bound on per-entry promotion interval |
//! | `lru_refresh_ratio` | 0.0 | >= 0 | Refresh time tracks `oldest_age * ratio`, capped at 900 s |
//! | `update_on_read` | true | - | Gate `record_access` for reads |
//! | `update_on_write` | false | - | Gate `record_access` for writes |
//! | `try_lock_update` | false | - | `record_access` uses try-lock; failure is a no-op |
//! | `window_to_cache_size_ratio` | 32 | [2, 128] | Sketch decay window as a multiple of capacity |
//! | `tiny_size_percent` | 1 | [1, 50] | Tiny segment share of the whole container |
//! | `mm_reconfigure_interval_secs` | 0 | - | Refresh-time recomputation interval (0 = never) |
//! | `newcomer_wins_on_tie` | true | - | Admission tie-break favors the Tiny candidate |
//! | `protection_freq` | 3 | - | Min frequency for Probation -> Main promotion |
//! | `protection_segment_size_pct` | 80 | [0, 100] | Main cap within Main + Probation |

use crate::error::ConfigError;

/// The kind of access being recorded against an entry.
///
/// `record_access` can be gated independently for reads and writes via
/// [`Config::update_on_read`] and [`Config::update_on_write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// The entry was read.
    Read,
    /// The entry was written.
    Write,
}

/// Tuning parameters for a W-TinyLFU container.
///
/// # Example
///
/// ```
/// use wtinylfu::Config;
///
/// let config = Config {
///     tiny_size_percent: 10,
///     protection_freq: 2,
///     ..Config::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Threshold in seconds compared against an entry's update time to decide
    /// whether an access moves it in its segment. Reduces contention on the
    /// container lock for hot entries.
    pub default_lru_refresh_time: u32,

    /// Ratio of refresh time to the oldest Main entry's age. If the computed
    /// value exceeds `default_lru_refresh_time` it is adopted instead,
    /// capped at 900 seconds. Only takes effect when reconfiguration is
    /// enabled via `mm_reconfigure_interval_secs`.
    pub lru_refresh_ratio: f64,

    /// Whether reads promote entries. If false, `record_access` with
    /// [`AccessMode::Read`] is a no-op.
    pub update_on_read: bool,

    /// Whether writes promote entries. If false, `record_access` with
    /// [`AccessMode::Write`] is a no-op.
    pub update_on_write: bool,

    /// Whether `record_access` uses a try-lock. If set and the lock is
    /// contended, the access is dropped rather than waited for.
    pub try_lock_update: bool,

    /// Frequency-window multiplier: the sketch counters are halved every
    /// `capacity * window_to_cache_size_ratio` frequency updates.
    pub window_to_cache_size_ratio: usize,

    /// Size of the Tiny segment as a percentage of the whole container.
    pub tiny_size_percent: usize,

    /// Minimum interval between refresh-time reconfigurations. If 0,
    /// reconfigure never runs.
    pub mm_reconfigure_interval_secs: u32,

    /// If true, a Tiny-tail entry whose frequency ties the Probation tail's
    /// wins the admission arbitration. Desirable by default, but for strict
    /// scan patterns (every key touched exactly once) a tie should not evict
    /// the resident entry.
    pub newcomer_wins_on_tie: bool,

    /// Minimum access frequency for promotion into the Main (protected)
    /// segment.
    pub protection_freq: u64,

    /// Size of the Main segment as a percentage of Main + Probation.
    pub protection_segment_size_pct: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_lru_refresh_time: 60,
            lru_refresh_ratio: 0.0,
            update_on_read: true,
            update_on_write: false,
            try_lock_update: false,
            window_to_cache_size_ratio: 32,
            tiny_size_percent: 1,
            mm_reconfigure_interval_secs: 0,
            newcomer_wins_on_tie: true,
            protection_freq: 3,
            protection_segment_size_pct: 80,
        }
    }
}

impl Config {
    /// Validates all fields, naming the offending field in the error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiny_size_percent < 1 || self.tiny_size_percent > 50 {
            return Err(ConfigError::new(format!(
                "tiny_size_percent {} out of range; must be within [1, 50]",
                self.tiny_size_percent
            )));
        }
        if self.window_to_cache_size_ratio < 2 || self.window_to_cache_size_ratio > 128 {
            return Err(ConfigError::new(format!(
                "window_to_cache_size_ratio {} out of range; must be within [2, 128]",
                self.window_to_cache_size_ratio
            )));
        }
        if self.protection_segment_size_pct > 100 {
            return Err(ConfigError::new(format!(
                "protection_segment_size_pct {} out of range; must be within [0, 100]",
                self.protection_segment_size_pct
            )));
        }
        if !self.lru_refresh_ratio.is_finite() || self.lru_refresh_ratio < 0.0 {
            return Err(ConfigError::new(format!(
                "lru_refresh_ratio {} must be finite and non-negative",
                self.lru_refresh_ratio
            )));
        }
        Ok(())
    }
}

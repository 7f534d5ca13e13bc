//! Count-Min sketch for approximate access frequencies.
//!
//! A small multi-row counter array that over-approximates per-key counts
//! with bounded error. Each row indexes the key's 64-bit hash through its
//! own fixed seed; a query returns the minimum across rows, which discards
//! most collision inflation.
//!
//! ```text
//!   row 0:  [ 0 | 3 | 0 | 1 | ... ]   idx = mix64(hash ^ SEED0) & mask
//!   row 1:  [ 1 | 0 | 3 | 0 | ... ]   idx = mix64(hash ^ SEED1) & mask
//!   row 2:  [ 0 | 0 | 4 | 0 | ... ]   ...
//!   row 3:  [ 3 | 0 | 0 | 2 | ... ]
//!                                      count(h) = min over rows
//! ```
//!
//! Counters are `u8` and saturate at 255; the container sizes the decay
//! window so real counts stay far below that. The row seeds are compile-time
//! constants, so a serialized container does not need to carry them.

/// Per-row hash seeds. Arbitrary odd 64-bit constants, fixed forever.
const ROW_SEEDS: [u64; 8] = [
    0x9e37_79b9_7f4a_7c15,
    0xc2b2_ae3d_27d4_eb4f,
    0x1656_67b1_9e37_79f9,
    0x27d4_eb2f_1656_67c5,
    0x6c62_272e_07bb_0142,
    0x5851_f42d_4c95_7f2d,
    0x8000_0000_0000_003b,
    0xd6e8_feb8_6659_fd93,
];

/// Finalizer from splitmix64; spreads the seeded hash across the row.
#[inline]
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Multi-row approximate frequency counter.
///
/// # Example
///
/// ```
/// use wtinylfu::ds::count_min_sketch::CountMinSketch;
///
/// let mut sketch = CountMinSketch::new(128, 4);
/// sketch.increment(42);
/// sketch.increment(42);
/// assert!(sketch.count(42) >= 2);
/// sketch.decay_counts_by(0.5);
/// assert!(sketch.count(42) >= 1);
/// ```
#[derive(Debug, Clone)]
pub struct CountMinSketch {
    /// Row-major `depth x width` counter table.
    table: Vec<u8>,
    width: usize,
    depth: usize,
    mask: u64,
}

impl CountMinSketch {
    /// Creates a sketch with at least `num_counters` counters per row and
    /// `num_hashes` rows.
    ///
    /// The per-row width is rounded up to the next power of two. The number
    /// of rows is clamped to the available seed set (8).
    pub fn new(num_counters: usize, num_hashes: usize) -> Self {
        let width = num_counters.max(2).next_power_of_two();
        let depth = num_hashes.clamp(1, ROW_SEEDS.len());
        Self {
            table: vec![0; width * depth],
            width,
            depth,
            mask: (width - 1) as u64,
        }
    }

    /// Counters per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Table footprint in bytes, for memory reporting.
    pub fn byte_size(&self) -> usize {
        self.table.len() * std::mem::size_of::<u8>()
    }

    #[inline]
    fn index(&self, row: usize, hash: u64) -> usize {
        row * self.width + (mix64(hash ^ ROW_SEEDS[row]) & self.mask) as usize
    }

    /// Bumps the counter for `hash` in every row, saturating at `u8::MAX`.
    pub fn increment(&mut self, hash: u64) {
        for row in 0..self.depth {
            let idx = self.index(row, hash);
            self.table[idx] = self.table[idx].saturating_add(1);
        }
    }

    /// Returns the estimated count for `hash`: the minimum across rows.
    pub fn count(&self, hash: u64) -> u64 {
        let mut min = u8::MAX;
        for row in 0..self.depth {
            let value = self.table[self.index(row, hash)];
            if value < min {
                min = value;
            }
        }
        u64::from(min)
    }

    /// Scales every counter by `factor`, truncating toward zero.
    ///
    /// Called with 0.5 at each window boundary so stale popularity fades
    /// instead of pinning entries forever.
    pub fn decay_counts_by(&mut self, factor: f64) {
        for counter in &mut self.table {
            *counter = (f64::from(*counter) * factor) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_rounds_up_to_power_of_two() {
        assert_eq!(CountMinSketch::new(100, 4).width(), 128);
        assert_eq!(CountMinSketch::new(128, 4).width(), 128);
        assert_eq!(CountMinSketch::new(129, 4).width(), 256);
        assert_eq!(CountMinSketch::new(0, 4).width(), 2);
    }

    #[test]
    fn depth_is_clamped_to_seed_count() {
        assert_eq!(CountMinSketch::new(16, 0).depth(), 1);
        assert_eq!(CountMinSketch::new(16, 4).depth(), 4);
        assert_eq!(CountMinSketch::new(16, 99).depth(), ROW_SEEDS.len());
    }

    #[test]
    fn count_tracks_increments() {
        let mut sketch = CountMinSketch::new(1024, 4);
        assert_eq!(sketch.count(7), 0);
        for _ in 0..5 {
            sketch.increment(7);
        }
        // Count-min never undercounts.
        assert!(sketch.count(7) >= 5);
    }

    #[test]
    fn untouched_keys_stay_near_zero() {
        let mut sketch = CountMinSketch::new(4096, 4);
        for key in 0u64..100 {
            sketch.increment(key);
        }
        // A wide sketch with 4 rows should not inflate an absent key by much.
        assert!(sketch.count(0xdead_beef) <= 1);
    }

    #[test]
    fn decay_halves_every_counter() {
        let mut sketch = CountMinSketch::new(256, 4);
        for _ in 0..8 {
            sketch.increment(1);
        }
        sketch.increment(2);

        let before: u64 = sketch.table.iter().map(|&c| u64::from(c)).sum();
        sketch.decay_counts_by(0.5);
        let after: u64 = sketch.table.iter().map(|&c| u64::from(c)).sum();

        assert!(after <= before / 2);
        assert_eq!(sketch.count(1), 4);
        // A single observation decays to zero under integer halving.
        assert_eq!(sketch.count(2), 0);
    }

    #[test]
    fn increments_saturate() {
        let mut sketch = CountMinSketch::new(2, 1);
        for _ in 0..1000 {
            sketch.increment(1);
        }
        assert_eq!(sketch.count(1), u64::from(u8::MAX));
    }

    #[test]
    fn byte_size_reflects_table() {
        let sketch = CountMinSketch::new(128, 4);
        assert_eq!(sketch.byte_size(), 128 * 4);
    }

    #[test]
    fn rows_use_distinct_indices() {
        let sketch = CountMinSketch::new(1024, 4);
        let indices: Vec<_> = (0..4).map(|row| sketch.index(row, 12345) % 1024).collect();
        let distinct: std::collections::HashSet<_> = indices.iter().collect();
        assert!(distinct.len() > 1, "rows should not all collide");
    }
}

//! Prize Table
//!
//! Maps a uniform random byte to one of eight segments through seven
//! ascending cumulative thresholds, and each segment to a fixed-point payout
//! multiplier over [`MULTIPLIER_DENOMINATOR`].

use serde::{Deserialize, Serialize};

/// Number of wheel segments.
pub const SEGMENT_COUNT: usize = 8;

/// Fixed-point denominator for multipliers (10000 = 1.0x).
pub const MULTIPLIER_DENOMINATOR: u64 = 10_000;

/// Default bucket boundaries over 0..=255.
///
/// Roughly 25/20/20/15/10/5/3/2 percent for segments 0..7.
pub const DEFAULT_THRESHOLDS: [u8; SEGMENT_COUNT - 1] = [64, 115, 166, 205, 231, 244, 252];

/// Default multipliers: 0x, 0.5x, 1x, 1.5x, 2x, 3x, 5x, 100x.
pub const DEFAULT_MULTIPLIERS: [u64; SEGMENT_COUNT] =
    [0, 5_000, 10_000, 15_000, 20_000, 30_000, 50_000, 1_000_000];

/// Segment thresholds and multipliers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTable {
    thresholds: [u8; SEGMENT_COUNT - 1],
    multipliers: [u64; SEGMENT_COUNT],
}

impl Default for PrizeTable {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS,
            multipliers: DEFAULT_MULTIPLIERS,
        }
    }
}

impl PrizeTable {
    /// Build a table. Returns `None` unless thresholds are strictly ascending.
    pub fn new(thresholds: [u8; SEGMENT_COUNT - 1], multipliers: [u64; SEGMENT_COUNT]) -> Option<Self> {
        if !thresholds.windows(2).all(|w| w[0] < w[1]) {
            return None;
        }
        Some(Self { thresholds, multipliers })
    }

    /// Threshold list, lowest first.
    pub fn thresholds(&self) -> &[u8; SEGMENT_COUNT - 1] {
        &self.thresholds
    }

    /// Multiplier list indexed by segment.
    pub fn multipliers(&self) -> &[u64; SEGMENT_COUNT] {
        &self.multipliers
    }

    /// Multiplier for one segment. `None` for an out-of-range index.
    pub fn multiplier(&self, segment: u8) -> Option<u64> {
        self.multipliers.get(segment as usize).copied()
    }

    /// Largest multiplier in the table.
    pub fn max_multiplier(&self) -> u64 {
        self.multipliers.iter().copied().max().unwrap_or(0)
    }

    /// Replace one segment's multiplier.
    ///
    /// Returns the previous value, or `None` if `segment` is out of range.
    pub fn set_multiplier(&mut self, segment: u8, multiplier: u64) -> Option<u64> {
        let slot = self.multipliers.get_mut(segment as usize)?;
        Some(std::mem::replace(slot, multiplier))
    }

    /// Plaintext segment for a random byte. The last satisfied threshold wins.
    pub fn segment_for(&self, random: u8) -> u8 {
        let mut segment = 0;
        for (i, threshold) in self.thresholds.iter().enumerate() {
            if random >= *threshold {
                segment = i as u8 + 1;
            }
        }
        segment
    }

    /// Number of byte values that land in each segment (sums to 256).
    pub fn bucket_sizes(&self) -> [u16; SEGMENT_COUNT] {
        let mut sizes = [0u16; SEGMENT_COUNT];
        let mut lower = 0u16;
        for (i, threshold) in self.thresholds.iter().enumerate() {
            sizes[i] = *threshold as u16 - lower;
            lower = *threshold as u16;
        }
        sizes[SEGMENT_COUNT - 1] = 256 - lower;
        sizes
    }

    /// `floor(bet * multiplier[segment] / 10000)`, computed in 128 bits and
    /// saturated to `u64::MAX`. Out-of-range segments pay nothing.
    pub fn payout(&self, bet: u64, segment: u8) -> u64 {
        let Some(multiplier) = self.multiplier(segment) else {
            return 0;
        };
        let wide = bet as u128 * multiplier as u128 / MULTIPLIER_DENOMINATOR as u128;
        u64::try_from(wide).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buckets() {
        let table = PrizeTable::default();
        assert_eq!(table.segment_for(0), 0);
        assert_eq!(table.segment_for(63), 0);
        assert_eq!(table.segment_for(64), 1);
        assert_eq!(table.segment_for(114), 1);
        assert_eq!(table.segment_for(115), 2);
        assert_eq!(table.segment_for(251), 6);
        assert_eq!(table.segment_for(252), 7);
        assert_eq!(table.segment_for(255), 7);
    }

    #[test]
    fn test_bucket_sizes_cover_byte_range() {
        let sizes = PrizeTable::default().bucket_sizes();
        assert_eq!(sizes, [64, 51, 51, 39, 26, 13, 8, 4]);
        assert_eq!(sizes.iter().sum::<u16>(), 256);
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        assert!(PrizeTable::new([10, 20, 20, 30, 40, 50, 60], DEFAULT_MULTIPLIERS).is_none());
        assert!(PrizeTable::new([70, 20, 30, 40, 50, 60, 65], DEFAULT_MULTIPLIERS).is_none());
        assert!(PrizeTable::new([1, 2, 3, 4, 5, 6, 7], DEFAULT_MULTIPLIERS).is_some());
    }

    #[test]
    fn test_payout_formula() {
        let table = PrizeTable::default();
        assert_eq!(table.payout(10_000_000, 7), 1_000_000_000);
        assert_eq!(table.payout(10_000_000, 0), 0);
        assert_eq!(table.payout(3, 1), 1);
        assert_eq!(table.payout(10_000_000, 8), 0);
    }

    #[test]
    fn test_payout_saturates() {
        let table = PrizeTable::default();
        assert_eq!(table.payout(u64::MAX, 7), u64::MAX);
    }

    #[test]
    fn test_set_multiplier() {
        let mut table = PrizeTable::default();
        assert_eq!(table.set_multiplier(3, 12_500), Some(15_000));
        assert_eq!(table.multiplier(3), Some(12_500));
        assert_eq!(table.set_multiplier(8, 1), None);
        assert_eq!(table.max_multiplier(), 1_000_000);
    }
}

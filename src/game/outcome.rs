//! Outcome Engine
//!
//! Branch-free segment and winnings derivation over encrypted values.
//! Every loop here runs its full length: encrypted comparisons cannot
//! short-circuit, so each step is a compare followed by a select.

use crate::core::fhe::{FheBackend, FheError};
use crate::core::handle::{Euint64, Euint8};

use super::prize::{PrizeTable, MULTIPLIER_DENOMINATOR, SEGMENT_COUNT};

/// Map an encrypted random byte to an encrypted segment index.
///
/// Linear fold over the thresholds: seven `ge` comparisons and seven
/// selects, the last satisfied threshold wins.
pub fn derive_segment<B: FheBackend>(
    backend: &mut B,
    random: Euint8,
    table: &PrizeTable,
) -> Result<Euint8, FheError> {
    let mut segment = backend.trivial_u8(0);
    for (i, threshold) in table.thresholds().iter().enumerate() {
        let reached = backend.ge_scalar_u8(random, *threshold)?;
        let candidate = backend.trivial_u8(i as u8 + 1);
        segment = backend.select_u8(reached, candidate, segment)?;
    }
    Ok(segment)
}

/// Encrypted `floor(bet * multiplier[segment] / 10000)`.
///
/// All eight products are computed; the accumulator picks the one whose
/// index equals `segment`. Callers must keep `bet * max_multiplier` within
/// 64 bits.
pub fn calculate_winnings<B: FheBackend>(
    backend: &mut B,
    bet: Euint64,
    segment: Euint8,
    table: &PrizeTable,
) -> Result<Euint64, FheError> {
    let mut winnings = backend.trivial_u64(0);
    for index in 0..SEGMENT_COUNT as u8 {
        let multiplier = table.multipliers()[index as usize];
        let hit = backend.eq_scalar_u8(segment, index)?;
        let scaled = backend.mul_scalar(bet, multiplier)?;
        let payout = backend.div_scalar(scaled, MULTIPLIER_DENOMINATOR)?;
        winnings = backend.select(hit, payout, winnings)?;
    }
    Ok(winnings)
}

/// Clamp an encrypted bet into `[min, max]`: two comparisons, two selects.
pub fn clamp_bet<B: FheBackend>(
    backend: &mut B,
    bet: Euint64,
    min: u64,
    max: u64,
) -> Result<Euint64, FheError> {
    let floor = backend.trivial_u64(min);
    let ceiling = backend.trivial_u64(max);
    let below = backend.lt(bet, floor)?;
    let raised = backend.select(below, floor, bet)?;
    let above = backend.gt(raised, ceiling)?;
    backend.select(above, ceiling, raised)
}

/// Plaintext counterpart of [`clamp_bet`].
pub fn clamp_plain_bet(bet: u64, min: u64, max: u64) -> u64 {
    bet.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clear::ClearBackend;

    fn reveal_u8(backend: &ClearBackend, value: Euint8) -> u64 {
        backend.plaintext(value.handle()).unwrap()
    }

    fn reveal_u64(backend: &ClearBackend, value: Euint64) -> u64 {
        backend.plaintext(value.handle()).unwrap()
    }

    #[test]
    fn test_derive_segment_matches_plain_table() {
        let mut backend = ClearBackend::new(7);
        let table = PrizeTable::default();
        for r in 0..=255u8 {
            let random = backend.trivial_u8(r);
            let segment = derive_segment(&mut backend, random, &table).unwrap();
            assert_eq!(reveal_u8(&backend, segment), table.segment_for(r) as u64, "byte {}", r);
        }
    }

    #[test]
    fn test_derive_segment_boundaries() {
        let mut backend = ClearBackend::new(7);
        let table = PrizeTable::default();
        for (r, expected) in [(0u8, 0u64), (64, 1), (255, 7)] {
            let random = backend.trivial_u8(r);
            let segment = derive_segment(&mut backend, random, &table).unwrap();
            assert_eq!(reveal_u8(&backend, segment), expected);
        }
    }

    #[test]
    fn test_calculate_winnings_each_segment() {
        let mut backend = ClearBackend::new(7);
        let table = PrizeTable::default();
        let bet = backend.trivial_u64(10_000_000);
        for s in 0..SEGMENT_COUNT as u8 {
            let segment = backend.trivial_u8(s);
            let winnings = calculate_winnings(&mut backend, bet, segment, &table).unwrap();
            assert_eq!(reveal_u64(&backend, winnings), table.payout(10_000_000, s));
        }
    }

    #[test]
    fn test_jackpot_winnings() {
        let mut backend = ClearBackend::new(7);
        let table = PrizeTable::default();
        let bet = backend.trivial_u64(10_000_000);
        let segment = backend.trivial_u8(7);
        let winnings = calculate_winnings(&mut backend, bet, segment, &table).unwrap();
        assert_eq!(reveal_u64(&backend, winnings), 1_000_000_000);
    }

    #[test]
    fn test_clamp_bet() {
        let mut backend = ClearBackend::new(7);
        for (bet, expected) in [(5u64, 10u64), (10, 10), (42, 42), (100, 100), (500, 100)] {
            let input = backend.trivial_u64(bet);
            let clamped = clamp_bet(&mut backend, input, 10, 100).unwrap();
            assert_eq!(reveal_u64(&backend, clamped), expected);
            assert_eq!(clamp_plain_bet(bet, 10, 100), expected);
        }
    }
}

//! Outcome resolver — weighted random wheel prize selection
//!
//! Cumulative-weight sampling: walk the candidates in catalog order keeping a
//! running sum, draw `u` uniformly from `[0, total)`, return the first
//! candidate whose running sum exceeds `u`. Zero-weight candidates never win.
//!
//! Randomness is injected so that tests can seed it and production can draw
//! from process entropy.

use rand::Rng;

use crate::catalog::RewardCatalogEntry;
use crate::error::{RewardError, RewardResult};

/// Sum of selectable weights
pub fn total_weight(entries: &[&RewardCatalogEntry]) -> f64 {
    entries
        .iter()
        .map(|e| e.weight)
        .filter(|w| w.is_finite() && *w > 0.0)
        .sum()
}

/// Choose a wheel prize with probability proportional to its weight
pub fn choose_wheel_prize<'a, R: Rng + ?Sized>(
    entries: &[&'a RewardCatalogEntry],
    rng: &mut R,
) -> RewardResult<&'a RewardCatalogEntry> {
    let total = total_weight(entries);
    if entries.is_empty() || !total.is_finite() || total <= 0.0 {
        return Err(RewardError::EmptyCatalog);
    }

    let roll = rng.random_range(0.0..total);
    select_at(entries, roll).ok_or(RewardError::EmptyCatalog)
}

/// Map a draw in `[0, total)` onto a candidate
fn select_at<'a>(entries: &[&'a RewardCatalogEntry], roll: f64) -> Option<&'a RewardCatalogEntry> {
    let mut cumulative = 0.0;
    for entry in entries.iter().copied() {
        if !(entry.weight.is_finite() && entry.weight > 0.0) {
            continue;
        }
        cumulative += entry.weight;
        if cumulative > roll {
            return Some(entry);
        }
    }
    // Rounding can leave the roll at the very top of the range
    entries
        .iter()
        .rev()
        .copied()
        .find(|e| e.weight.is_finite() && e.weight > 0.0)
}

/// Random extra whole turns in `0..=max`
pub fn extra_turns<R: Rng + ?Sized>(rng: &mut R, max: u32) -> u32 {
    if max == 0 {
        0
    } else {
        rng.random_range(0..=max)
    }
}

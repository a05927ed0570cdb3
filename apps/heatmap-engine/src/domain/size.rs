//! Synthetic Visual Weight
//!
//! Derives the strictly-positive scalar that drives area-proportional
//! rendering. Trading interest is the signal a heatmap should surface, so
//! accumulated volume dominates the blend; market capitalization and
//! momentum contribute second-order adjustments.
//!
//! Contracts (binding): result >= 1, monotonically non-decreasing in
//! volume, deterministic for equal inputs. The blend weights themselves
//! are tunable.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Weight on the log-scaled volume term (dominant).
const VOLUME_WEIGHT: f64 = 2.5;

/// Weight on the log-scaled market-cap term.
const MARKET_CAP_WEIGHT: f64 = 0.6;

/// Weight on the momentum term.
const MOMENTUM_WEIGHT: f64 = 0.4;

/// Momentum contribution is capped at this absolute change percent so a
/// single halted-then-gapped name cannot dwarf the rest of its sector.
const MOMENTUM_CAP: f64 = 20.0;

/// Market cap is scaled to millions before the log, keeping the term in
/// the same numeric range as the volume term.
const MARKET_CAP_SCALE: f64 = 1.0e6;

/// Compute the visual weight for one stock.
///
/// Inputs that are absent or nonsensical (negative cap, non-convertible
/// decimals) contribute zero; the floor of 1.0 always holds.
#[must_use]
pub fn visual_weight(market_cap: Option<Decimal>, volume: u64, change_percent: Decimal) -> f64 {
    let volume_term = VOLUME_WEIGHT * (1.0 + volume as f64).ln();

    let cap_term = market_cap
        .and_then(|cap| cap.to_f64())
        .filter(|cap| *cap > 0.0)
        .map_or(0.0, |cap| {
            MARKET_CAP_WEIGHT * (1.0 + cap / MARKET_CAP_SCALE).ln()
        });

    let momentum = change_percent.to_f64().map_or(0.0, f64::abs);
    let momentum_term = MOMENTUM_WEIGHT * momentum.min(MOMENTUM_CAP);

    let weight = 1.0 + volume_term + cap_term + momentum_term;
    weight.max(1.0)
}

//! Reconciliation
//!
//! Pure heatmap derivation plus the small pieces of state around it:
//! the frozen baseline book, the feed-activity classifier, and the
//! cadence gate that decides when a reconciled snapshot is actually
//! published.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;

use crate::domain::market::TradeTick;
use crate::domain::size::visual_weight;
use crate::domain::snapshot::{HeatmapSnapshot, SectorAggregate, StockView};

#[derive(Debug, Clone, Copy)]
struct Anchor {
    baseline: Decimal,
    reference_close: Option<Decimal>,
}

/// Baseline prices, frozen per symbol for the lifetime of the engine.
///
/// The baseline is whichever arrives first for a symbol: the first
/// observed tick price, or a positive previous close from the reference
/// backfill. Once set it never moves, so intraday change is always
/// measured against the same anchor. The reference close is tracked
/// separately: it is the only value ever shown as a prior-session
/// close, and a symbol without one stays unclosed no matter how many
/// ticks it trades.
#[derive(Debug, Default)]
pub struct BaselineBook {
    anchors: HashMap<String, Anchor>,
}

impl BaselineBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tick. The first tick for an unanchored symbol freezes
    /// its price as the baseline.
    pub fn observe_tick(&mut self, tick: &TradeTick) {
        if tick.price > Decimal::ZERO {
            self.anchors.entry(tick.symbol.clone()).or_insert(Anchor {
                baseline: tick.price,
                reference_close: None,
            });
        }
    }

    /// Install a reference close. A non-positive close is ignored. The
    /// close is always recorded for display, but it only becomes the
    /// baseline when the symbol is not already anchored by a tick.
    pub fn install_reference(&mut self, symbol: &str, close: Decimal) {
        if close > Decimal::ZERO {
            let anchor = self.anchors.entry(symbol.to_owned()).or_insert(Anchor {
                baseline: close,
                reference_close: None,
            });
            anchor.reference_close = Some(close);
        }
    }

    /// The frozen baseline for a symbol, if any.
    #[must_use]
    pub fn baseline(&self, symbol: &str) -> Option<Decimal> {
        self.anchors.get(symbol).map(|anchor| anchor.baseline)
    }

    /// The prior-session close for a symbol, if the backfill produced
    /// one. Never synthesized from tick data.
    #[must_use]
    pub fn reference_close(&self, symbol: &str) -> Option<Decimal> {
        self.anchors
            .get(symbol)
            .and_then(|anchor| anchor.reference_close)
    }

    /// Number of anchored symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether no symbol is anchored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// Whether the feed is delivering fresh data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedActivity {
    /// Connected and ticking within the staleness window.
    Active,
    /// Disconnected, or silent for longer than the window.
    Stale,
}

impl FeedActivity {
    /// Classify the feed from its connection flag and last event time.
    #[must_use]
    pub fn evaluate(
        connected: bool,
        last_event_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        window: ChronoDuration,
    ) -> Self {
        if !connected {
            return Self::Stale;
        }
        match last_event_at {
            Some(at) if now.signed_duration_since(at) <= window => Self::Active,
            _ => Self::Stale,
        }
    }
}

/// Decides on each reconcile cycle whether to publish.
///
/// A stale feed freezes the visible snapshot: nothing publishes until
/// activity returns. While active, publication coalesces to the slow
/// cadence, except that a stale-to-active transition publishes
/// immediately so a reconnect shows up within one fast cycle.
#[derive(Debug)]
pub struct ReconcileGate {
    cadence: ChronoDuration,
    last_applied: Option<DateTime<Utc>>,
    last_activity: FeedActivity,
}

impl ReconcileGate {
    /// Create a gate with the given publication cadence.
    #[must_use]
    pub const fn new(cadence: ChronoDuration) -> Self {
        Self {
            cadence,
            last_applied: None,
            last_activity: FeedActivity::Stale,
        }
    }

    /// Whether this cycle should publish. Updates internal state.
    pub fn should_apply(&mut self, activity: FeedActivity, now: DateTime<Utc>) -> bool {
        let resumed =
            activity == FeedActivity::Active && self.last_activity == FeedActivity::Stale;
        self.last_activity = activity;

        if activity == FeedActivity::Stale {
            return false;
        }

        let due = match self.last_applied {
            None => true,
            Some(at) => now.signed_duration_since(at) >= self.cadence,
        };

        if resumed || due {
            self.last_applied = Some(now);
            true
        } else {
            false
        }
    }
}

const PERCENT: Decimal = Decimal::ONE_HUNDRED;

/// Derive a fresh snapshot from the previous one and the latest inputs.
///
/// Deterministic: the same inputs always produce the same snapshot.
/// Sector membership and ordering come from `prev`; within a sector,
/// stocks are reordered by descending volume with ticker as tiebreak.
#[must_use]
pub fn reconcile(
    prev: &HeatmapSnapshot,
    ticks: &HashMap<String, TradeTick>,
    volumes: &HashMap<String, u64>,
    baselines: &BaselineBook,
    now: DateTime<Utc>,
) -> HeatmapSnapshot {
    let sectors = prev
        .sectors
        .iter()
        .map(|sector| reconcile_sector(sector, ticks, volumes, baselines))
        .collect();

    HeatmapSnapshot {
        sectors,
        total_stocks: prev.total_stocks,
        last_update: now,
    }
}

fn reconcile_sector(
    sector: &SectorAggregate,
    ticks: &HashMap<String, TradeTick>,
    volumes: &HashMap<String, u64>,
    baselines: &BaselineBook,
) -> SectorAggregate {
    let mut stocks: Vec<StockView> = sector
        .stocks
        .iter()
        .map(|stock| reconcile_stock(stock, ticks, volumes, baselines))
        .collect();

    stocks.sort_by(|a, b| {
        b.volume
            .cmp(&a.volume)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    let (sum, count) = stocks
        .iter()
        .filter(|s| s.price > Decimal::ZERO && baselines.baseline(&s.ticker).is_some())
        .fold((Decimal::ZERO, 0u32), |(sum, count), s| {
            (sum + s.change_percent, count + 1)
        });

    // No stock qualifies until prices and baselines exist; carry the
    // previous average rather than fabricating zero movement.
    let avg_change = if count > 0 {
        sum / Decimal::from(count)
    } else {
        sector.avg_change
    };

    let total_size = stocks.iter().map(|s| s.size).sum();

    SectorAggregate {
        sector: sector.sector.clone(),
        name: sector.name.clone(),
        stocks,
        avg_change,
        total_size,
    }
}

fn reconcile_stock(
    stock: &StockView,
    ticks: &HashMap<String, TradeTick>,
    volumes: &HashMap<String, u64>,
    baselines: &BaselineBook,
) -> StockView {
    let mut next = stock.clone();

    if let Some(tick) = ticks.get(&stock.ticker) {
        next.price = tick.price;
    }
    if let Some(volume) = volumes.get(&stock.ticker) {
        next.volume = *volume;
    }
    if let Some(close) = baselines.reference_close(&stock.ticker) {
        next.previous_close = Some(close);
    }

    match baselines.baseline(&stock.ticker) {
        Some(baseline) if next.price > Decimal::ZERO => {
            next.change = next.price - baseline;
            next.change_percent = next.change / baseline * PERCENT;
        }
        _ => {
            next.change = Decimal::ZERO;
            next.change_percent = Decimal::ZERO;
        }
    }

    next.size = visual_weight(next.market_cap, next.volume, next.change_percent);
    next
}

//! Sector-Grouped Snapshot Model
//!
//! The immutable output tree: snapshot → sectors → stocks. Every
//! recomputation builds a brand-new value; nothing in here is ever
//! mutated in place after construction, which is what lets the holder
//! swap snapshots atomically under concurrent readers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::SecurityMetadata;
use super::size::visual_weight;

/// Per-security view within a sector.
///
/// Created zeroed when metadata loads; price/change/volume/size are
/// refined incrementally as ticks, volumes and reference prices arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockView {
    /// Canonical uppercase ticker symbol.
    pub ticker: String,
    /// Company display name.
    pub name: String,
    /// Sector bucket key this stock belongs to.
    pub sector: String,
    /// Last traded price (zero until the first tick).
    pub price: Decimal,
    /// Absolute change against the session baseline.
    pub change: Decimal,
    /// Percentage change against the session baseline.
    pub change_percent: Decimal,
    /// Accumulated session volume from the poller.
    pub volume: u64,
    /// Prior-session closing price, when the reference backfill found one.
    pub previous_close: Option<Decimal>,
    /// Visual weight for area-proportional rendering, always >= 1.
    pub size: f64,
    /// Market capitalization from metadata.
    pub market_cap: Option<Decimal>,
}

impl StockView {
    /// Build the zeroed initial view for one security.
    #[must_use]
    pub fn skeleton(meta: &SecurityMetadata) -> Self {
        Self {
            ticker: meta.symbol.clone(),
            name: meta.name.clone(),
            sector: meta.sector.clone(),
            price: Decimal::ZERO,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            volume: 0,
            previous_close: None,
            size: visual_weight(meta.market_cap, 0, Decimal::ZERO),
            market_cap: meta.market_cap,
        }
    }

    /// Whether this stock has traded this session.
    ///
    /// A zero price means the skeleton value has never been refined by a
    /// tick; such stocks carry no meaningful change figures yet.
    #[must_use]
    pub fn has_traded(&self) -> bool {
        self.price > Decimal::ZERO
    }
}

/// One sector bucket with its stocks sorted by volume descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAggregate {
    /// Sector bucket key.
    pub sector: String,
    /// Human-readable sector name.
    pub name: String,
    /// Constituent stocks, non-increasing by volume.
    pub stocks: Vec<StockView>,
    /// Mean change percent over stocks with a meaningful baseline.
    pub avg_change: Decimal,
    /// Sum of constituent visual weights.
    pub total_size: f64,
}

/// The complete point-in-time view of the universe.
///
/// An aggregate root: consumers receive this as a shared immutable value
/// and can rely on it never changing underneath them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapSnapshot {
    /// Sector buckets in stable (alphabetical key) order.
    pub sectors: Vec<SectorAggregate>,
    /// Total number of securities across all sectors.
    pub total_stocks: usize,
    /// When this snapshot was produced.
    pub last_update: DateTime<Utc>,
}

impl HeatmapSnapshot {
    /// The empty snapshot used before metadata has loaded.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sectors: Vec::new(),
            total_stocks: 0,
            last_update: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Whether the sector skeleton exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_stocks == 0
    }

    /// Build the initial skeleton from the metadata universe.
    ///
    /// Groups securities into sector buckets with zeroed views. Duplicate
    /// symbols are dropped so the one-view-per-symbol invariant holds from
    /// the start. Sector order is alphabetical by key for stable output.
    #[must_use]
    pub fn skeleton(universe: &[SecurityMetadata], now: DateTime<Utc>) -> Self {
        let mut buckets: BTreeMap<String, Vec<StockView>> = BTreeMap::new();
        let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();

        for meta in universe {
            if !seen.insert(meta.symbol.as_str()) {
                continue;
            }
            buckets
                .entry(meta.sector.clone())
                .or_default()
                .push(StockView::skeleton(meta));
        }

        let mut total_stocks = 0;
        let sectors = buckets
            .into_iter()
            .map(|(sector, stocks)| {
                total_stocks += stocks.len();
                let total_size = stocks.iter().map(|s| s.size).sum();
                SectorAggregate {
                    name: sector_display_name(&sector),
                    sector,
                    stocks,
                    avg_change: Decimal::ZERO,
                    total_size,
                }
            })
            .collect();

        Self {
            sectors,
            total_stocks,
            last_update: now,
        }
    }

    /// Produce a new snapshot with reference prices patched in.
    ///
    /// Symbols absent from `closes` keep `previous_close: None`. Derived
    /// fields are untouched here; the next reconciliation picks up the new
    /// baselines.
    #[must_use]
    pub fn with_reference_prices(
        &self,
        closes: &std::collections::HashMap<String, Decimal>,
        now: DateTime<Utc>,
    ) -> Self {
        let sectors = self
            .sectors
            .iter()
            .map(|sector| {
                let stocks = sector
                    .stocks
                    .iter()
                    .map(|stock| {
                        let mut patched = stock.clone();
                        if let Some(close) = closes.get(&stock.ticker) {
                            patched.previous_close = Some(*close);
                        }
                        patched
                    })
                    .collect();
                SectorAggregate {
                    sector: sector.sector.clone(),
                    name: sector.name.clone(),
                    stocks,
                    avg_change: sector.avg_change,
                    total_size: sector.total_size,
                }
            })
            .collect();

        Self {
            sectors,
            total_stocks: self.total_stocks,
            last_update: now,
        }
    }

    /// All symbols in the snapshot, in sector order.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.sectors
            .iter()
            .flat_map(|sector| sector.stocks.iter().map(|s| s.ticker.clone()))
            .collect()
    }
}

/// Derive a human-readable sector name from its key.
///
/// Keys arrive lowercased with underscores ("consumer_staples"); the
/// display form title-cases each word.
#[must_use]
pub fn sector_display_name(key: &str) -> String {
    key.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

//! Market Data Primitives
//!
//! Input-side domain types: the static security metadata that shapes the
//! sector skeleton, and the ephemeral trade tick consumed from the push
//! feed. Only the most recent tick per symbol is ever retained upstream,
//! so ticks carry no sequence information.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalize a ticker symbol to its canonical uppercase form.
///
/// Symbols are the unique key across every dataset the engine merges;
/// normalizing once at each ingest boundary keeps lookups consistent
/// regardless of upstream casing.
#[must_use]
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Static descriptive data for one tradable security.
///
/// Loaded wholesale from the metadata endpoint once per session and
/// replaced in full on background refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetadata {
    /// Canonical uppercase ticker symbol (unique key).
    pub symbol: String,
    /// Human-readable company name.
    pub name: String,
    /// Sector bucket key (e.g. "technology").
    pub sector: String,
    /// Listing exchange code.
    pub exchange: String,
    /// Market capitalization, when the upstream knows it.
    pub market_cap: Option<Decimal>,
}

impl SecurityMetadata {
    /// Return a copy with the symbol normalized to canonical form.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.symbol = normalize_symbol(&self.symbol);
        self
    }
}

/// A single trade observation from the push feed.
///
/// Ephemeral: the feed boundary overwrites the previous tick for the same
/// symbol, so at most one of these exists per symbol at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Canonical uppercase ticker symbol.
    pub symbol: String,
    /// Last traded price.
    pub price: Decimal,
    /// Exchange timestamp of the trade.
    pub timestamp: DateTime<Utc>,
}

impl TradeTick {
    /// Create a tick with a normalized symbol.
    #[must_use]
    pub fn new(symbol: &str, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            price,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_normalization() {
        assert_eq!(normalize_symbol("aapl"), "AAPL");
        assert_eq!(normalize_symbol(" msft "), "MSFT");
        assert_eq!(normalize_symbol("BRK.B"), "BRK.B");
    }

    #[test]
    fn metadata_normalized_uppercases_symbol() {
        let meta = SecurityMetadata {
            symbol: "nvda".to_string(),
            name: "NVIDIA Corporation".to_string(),
            sector: "technology".to_string(),
            exchange: "NASDAQ".to_string(),
            market_cap: None,
        };
        assert_eq!(meta.normalized().symbol, "NVDA");
    }

    #[test]
    fn tick_constructor_normalizes() {
        let tick = TradeTick::new("tsla", Decimal::from(250), Utc::now());
        assert_eq!(tick.symbol, "TSLA");
    }
}

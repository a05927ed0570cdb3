//! Ports
//!
//! Trait boundaries between the application services and the
//! infrastructure adapters that implement them. Services depend on
//! these traits only, so tests can substitute mocks without touching
//! the network.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::market::{SecurityMetadata, TradeTick};
use crate::resilience::RetryClass;

/// Errors surfaced by market-data sources.
#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    /// The request never completed (connect failure, timeout, DNS).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status}: {message}")]
    Api {
        /// HTTP status code from the upstream.
        status: u16,
        /// Response body or reason phrase, truncated.
        message: String,
    },

    /// The response arrived but could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A batched endpoint was called with zero symbols.
    #[error("empty symbol list")]
    EmptySymbolList,
}

impl RetryClass for MarketDataError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) | Self::EmptySymbolList => false,
        }
    }
}

/// Source of the tradable universe with sector assignments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UniverseSource: Send + Sync {
    /// Fetch the full security universe.
    async fn fetch_universe(&self) -> Result<Vec<SecurityMetadata>, MarketDataError>;
}

/// Source of previous-session closing prices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferencePriceSource: Send + Sync {
    /// Fetch previous closes for the given symbols. Symbols the
    /// upstream does not know are simply absent from the result.
    async fn fetch_previous_closes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Decimal>, MarketDataError>;
}

/// Source of cumulative session volumes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VolumeSource: Send + Sync {
    /// Fetch session volumes for the given symbols.
    async fn fetch_volumes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, u64>, MarketDataError>;
}

/// Read-side view of the live tick feed.
///
/// The feed adapter accumulates ticks as they arrive; the reconcile
/// loop drains a consistent copy on each cycle. All methods are cheap
/// and non-blocking.
pub trait TickFeed: Send + Sync {
    /// Latest tick per symbol since the feed started.
    fn latest_ticks(&self) -> HashMap<String, TradeTick>;

    /// Whether the underlying connection is currently up.
    fn is_connected(&self) -> bool;

    /// Timestamp of the most recent feed event, if any.
    fn last_event_at(&self) -> Option<DateTime<Utc>>;
}

//! Tick feed state.
//!
//! The in-memory write side of the tick stream. Whatever transport
//! delivers trades (a streaming session, or the simulator in the
//! binary) pushes them here; the reconcile loop reads through the
//! `TickFeed` port. Intermediate ticks between reconcile cycles are
//! intentionally conflated: only the latest price per symbol matters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::application::ports::TickFeed;
use crate::domain::market::TradeTick;

/// Shared feed state: latest tick per symbol plus connectivity.
#[derive(Debug, Default)]
pub struct FeedState {
    ticks: RwLock<HashMap<String, TradeTick>>,
    connected: AtomicBool,
    last_event_at: RwLock<Option<DateTime<Utc>>>,
    events_total: AtomicU64,
}

impl FeedState {
    /// Create a disconnected, empty feed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trade, replacing any earlier tick for the symbol.
    pub fn record_tick(&self, tick: TradeTick) {
        *self.last_event_at.write() = Some(tick.timestamp);
        self.events_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("heatmap_feed_ticks_total").increment(1);
        self.ticks.write().insert(tick.symbol.clone(), tick);
    }

    /// Flip the connection flag.
    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::AcqRel);
        if was != connected {
            tracing::info!(connected, "Feed connection state changed");
            metrics::gauge!("heatmap_feed_connected").set(f64::from(u8::from(connected)));
        }
    }

    /// Total events recorded since startup.
    #[must_use]
    pub fn events_total(&self) -> u64 {
        self.events_total.load(Ordering::Relaxed)
    }
}

impl TickFeed for FeedState {
    fn latest_ticks(&self) -> HashMap<String, TradeTick> {
        self.ticks.read().clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn last_event_at(&self) -> Option<DateTime<Utc>> {
        *self.last_event_at.read()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn starts_disconnected_and_empty() {
        let feed = FeedState::new();
        assert!(!feed.is_connected());
        assert!(feed.latest_ticks().is_empty());
        assert!(feed.last_event_at().is_none());
    }

    #[test]
    fn later_ticks_replace_earlier_ones() {
        let feed = FeedState::new();
        let t0 = Utc::now();
        feed.record_tick(TradeTick::new("AAPL", dec!(100), t0));
        feed.record_tick(TradeTick::new("AAPL", dec!(101), t0));
        feed.record_tick(TradeTick::new("MSFT", dec!(400), t0));

        let ticks = feed.latest_ticks();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks["AAPL"].price, dec!(101));
        assert_eq!(feed.events_total(), 3);
    }

    #[test]
    fn last_event_tracks_the_newest_tick() {
        let feed = FeedState::new();
        let t0 = Utc::now();
        feed.record_tick(TradeTick::new("AAPL", dec!(100), t0));
        assert_eq!(feed.last_event_at(), Some(t0));
    }

    #[test]
    fn connection_flag_round_trips() {
        let feed = FeedState::new();
        feed.set_connected(true);
        assert!(feed.is_connected());
        feed.set_connected(false);
        assert!(!feed.is_connected());
    }
}

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Heatmap Engine - Sector Snapshot Reconciler
//!
//! Maintains a continuously refreshed, sector-grouped market snapshot
//! by reconciling a live tick stream against three slower sources: the
//! security universe with sector assignments, previous-session closing
//! prices, and cumulative session volumes.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: The snapshot model and derived metrics
//!   - `market`: Security metadata and trade ticks
//!   - `snapshot`: Immutable sector-grouped heatmap snapshots
//!   - `size`: Visual weight blending volume, cap and momentum
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for the universe, reference-price, volume
//!     and tick-feed sources
//!   - `services`: Universe caching, reconciliation, the snapshot
//!     store, and the engine lifecycle
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `http`: REST market-data client
//!   - `feed`: In-memory tick feed state
//!   - `config`: Environment configuration
//!   - `telemetry` / `metrics`: Logging and Prometheus metrics
//!
//! # Data Flow
//!
//! ```text
//! Tick stream ──► FeedState ──┐
//! Universe  ──► skeleton ─────┼──► reconcile ──► SnapshotStore ──► subscribers
//! Prev closes ──► baselines ──┤      (1s cycle,
//! Volumes ──► volume cache ───┘       5s cadence)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - Snapshot model with no external integrations.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Resilience utilities shared by all network-facing components.
pub mod resilience;

// Domain types
pub use domain::market::{SecurityMetadata, TradeTick, normalize_symbol};
pub use domain::snapshot::{HeatmapSnapshot, SectorAggregate, StockView};

// Application services and ports
pub use application::ports::{
    MarketDataError, ReferencePriceSource, TickFeed, UniverseSource, VolumeSource,
};
pub use application::services::engine::{EngineTuning, HeatmapEngine};
pub use application::services::{SnapshotStore, UniverseService};

// Infrastructure config
pub use infrastructure::config::{ConfigError, EngineConfig, HttpSettings};

// Adapters (for integration tests)
pub use infrastructure::feed::FeedState;
pub use infrastructure::http::MarketDataClient;

// Metrics and telemetry
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::telemetry::init_logging;

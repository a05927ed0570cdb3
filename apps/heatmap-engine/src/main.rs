//! Heatmap Engine Binary
//!
//! Starts the sector heatmap reconciliation engine.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin heatmap-engine
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `HEATMAP_API_URL`: Market data API base URL (default: <http://localhost:8090>)
//! - `HEATMAP_HTTP_TIMEOUT_SECS`: Per-request timeout (default: 10)
//! - `HEATMAP_UNIVERSE_TTL_SECS`: Universe cache TTL (default: 300)
//! - `HEATMAP_VOLUME_POLL_SECS`: Volume poll interval (default: 5)
//! - `HEATMAP_RECONCILE_CYCLE_SECS`: Reconcile cycle interval (default: 1)
//! - `HEATMAP_PUBLISH_CADENCE_SECS`: Snapshot publish cadence (default: 5)
//! - `HEATMAP_STALENESS_WINDOW_SECS`: Feed staleness window (default: 30)
//! - `HEATMAP_METRICS_PORT`: Prometheus metrics port, 0 disables (default: 9091)
//! - `HEATMAP_SIMULATE_FEED`: Generate synthetic ticks instead of a live feed
//! - `RUST_LOG`: Log level (default: info for this crate)

use std::sync::Arc;
use std::time::Duration;

use heatmap_engine::application::services::engine::HeatmapEngine;
use heatmap_engine::application::services::universe::UniverseService;
use heatmap_engine::infrastructure::config::EngineConfig;
use heatmap_engine::infrastructure::feed::FeedState;
use heatmap_engine::infrastructure::http::MarketDataClient;
use heatmap_engine::infrastructure::telemetry;
use heatmap_engine::init_metrics;
use rust_decimal::Decimal;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    telemetry::init_logging();

    tracing::info!("Starting heatmap engine");

    let config = EngineConfig::from_env()?;
    log_config(&config);

    if let Err(error) = init_metrics(config.server.metrics_port) {
        tracing::warn!(%error, "Metrics disabled");
    }

    let client = Arc::new(MarketDataClient::new(&config.http)?);
    let feed = Arc::new(FeedState::new());
    let universe = Arc::new(UniverseService::new(
        Arc::clone(&client) as Arc<dyn heatmap_engine::UniverseSource>,
        config.universe.retry.clone(),
        config.universe.cache_ttl,
    ));

    let engine = Arc::new(HeatmapEngine::new(
        universe,
        Arc::clone(&client) as Arc<dyn heatmap_engine::ReferencePriceSource>,
        Arc::clone(&client) as Arc<dyn heatmap_engine::VolumeSource>,
        Arc::clone(&feed) as Arc<dyn heatmap_engine::TickFeed>,
        Arc::new(heatmap_engine::SnapshotStore::new()),
        config.tuning(),
    ));

    engine.start().await?;

    let shutdown_token = CancellationToken::new();

    if std::env::var("HEATMAP_SIMULATE_FEED").is_ok() {
        tracing::info!("Feed simulation enabled");
        spawn_feed_simulator(
            Arc::clone(&feed),
            engine.store().current().symbols(),
            shutdown_token.clone(),
        );
    }

    spawn_snapshot_logger(&engine, shutdown_token.clone());

    tracing::info!("Heatmap engine ready");

    await_shutdown(shutdown_token).await;
    engine.shutdown().await;

    tracing::info!("Heatmap engine stopped");
    Ok(())
}

/// Log each published snapshot at debug level.
fn spawn_snapshot_logger(engine: &Arc<HeatmapEngine>, shutdown: CancellationToken) {
    let mut rx = engine.store().subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    tracing::debug!(
                        sectors = snapshot.sectors.len(),
                        stocks = snapshot.total_stocks,
                        last_update = %snapshot.last_update,
                        "Snapshot published"
                    );
                }
            }
        }
    });
}

/// Synthetic tick generator for running without a live feed.
fn spawn_feed_simulator(
    feed: Arc<FeedState>,
    symbols: Vec<String>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        use rand::Rng;

        if symbols.is_empty() {
            tracing::warn!("No symbols to simulate");
            return;
        }

        feed.set_connected(true);
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        let mut prices: Vec<Decimal> = (0..symbols.len())
            .map(|i| Decimal::from((50 + (i % 20) * 10) as u64))
            .collect();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    feed.set_connected(false);
                    return;
                }
                _ = interval.tick() => {}
            }

            let idx = rand::rng().random_range(0..symbols.len());
            let step = Decimal::new(rand::rng().random_range(-50..=50), 2);
            prices[idx] = (prices[idx] + step).max(Decimal::ONE);
            feed.record_tick(heatmap_engine::TradeTick::new(
                &symbols[idx],
                prices[idx],
                chrono::Utc::now(),
            ));
        }
    });
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        api_url = %config.http.base_url,
        universe_ttl_secs = config.universe.cache_ttl.as_secs(),
        volume_poll_secs = config.volume.poll_interval.as_secs(),
        reconcile_cycle_secs = config.reconcile.cycle_interval.as_secs(),
        publish_cadence_secs = config.reconcile.publish_cadence.as_secs(),
        staleness_window_secs = config.reconcile.staleness_window.as_secs(),
        metrics_port = config.server.metrics_port,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}

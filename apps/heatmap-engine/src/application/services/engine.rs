//! Heatmap Engine
//!
//! Owns the heatmap lifecycle: initial universe load and skeleton
//! publication, the background reference-price backfill, the session
//! volume poller, and the reconcile loop that folds everything into
//! published snapshots. All background work stops on `shutdown()`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ports::{
    MarketDataError, ReferencePriceSource, TickFeed, VolumeSource,
};
use crate::application::services::reconciler::{
    BaselineBook, FeedActivity, ReconcileGate, reconcile,
};
use crate::application::services::store::SnapshotStore;
use crate::application::services::universe::UniverseService;
use crate::domain::snapshot::HeatmapSnapshot;
use crate::resilience::{RetryConfig, retry_with_backoff};

/// Timing and retry knobs for the engine's background tasks.
#[derive(Debug, Clone)]
pub struct EngineTuning {
    /// Retry budget for the reference-price backfill.
    pub backfill_retry: RetryConfig,
    /// How often session volumes are polled.
    pub volume_poll_interval: Duration,
    /// Reconcile cycle interval. Also the worst-case latency for a
    /// stale-to-active publication.
    pub reconcile_interval: Duration,
    /// Minimum spacing between published snapshots in steady state.
    pub publish_cadence: Duration,
    /// Feed silence beyond this marks the snapshot stale.
    pub staleness_window: Duration,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            backfill_retry: RetryConfig {
                max_retries: 4,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(8),
                multiplier: 2.0,
                jitter_factor: 0.1,
            },
            volume_poll_interval: Duration::from_secs(5),
            reconcile_interval: Duration::from_secs(1),
            publish_cadence: Duration::from_secs(5),
            staleness_window: Duration::from_secs(30),
        }
    }
}

/// The reconciliation engine.
pub struct HeatmapEngine {
    universe: Arc<UniverseService>,
    references: Arc<dyn ReferencePriceSource>,
    volumes: Arc<dyn VolumeSource>,
    feed: Arc<dyn TickFeed>,
    store: Arc<SnapshotStore>,
    tuning: EngineTuning,
    baselines: Arc<Mutex<BaselineBook>>,
    volume_cache: Arc<RwLock<HashMap<String, u64>>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HeatmapEngine {
    /// Wire up an engine. Nothing runs until [`Self::start`].
    #[must_use]
    pub fn new(
        universe: Arc<UniverseService>,
        references: Arc<dyn ReferencePriceSource>,
        volumes: Arc<dyn VolumeSource>,
        feed: Arc<dyn TickFeed>,
        store: Arc<SnapshotStore>,
        tuning: EngineTuning,
    ) -> Self {
        Self {
            universe,
            references,
            volumes,
            feed,
            store,
            tuning,
            baselines: Arc::new(Mutex::new(BaselineBook::new())),
            volume_cache: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The snapshot store this engine publishes into.
    #[must_use]
    pub fn store(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Load the universe, publish the skeleton, and spawn the
    /// background tasks.
    ///
    /// On failure the store carries the error message and no tasks are
    /// left running; [`Self::reload`] retries from scratch.
    pub async fn start(&self) -> Result<(), MarketDataError> {
        self.store.set_loading(true);
        self.store.set_error(None);

        let universe = match self.universe.load().await {
            Ok(universe) => universe,
            Err(err) => {
                error!(error = %err, "Universe load failed, engine not started");
                self.store.set_error(Some(err.to_string()));
                self.store.set_loading(false);
                return Err(err);
            }
        };

        let skeleton = HeatmapSnapshot::skeleton(&universe, Utc::now());
        let symbols = skeleton.symbols();
        info!(
            stocks = skeleton.total_stocks,
            sectors = skeleton.sectors.len(),
            "Publishing skeleton snapshot"
        );
        self.store.replace(skeleton);
        self.store.set_loading(false);

        let mut tasks = self.tasks.lock();
        tasks.push(self.spawn_backfill(symbols.clone()));
        tasks.push(self.spawn_volume_poller(symbols));
        tasks.push(self.spawn_reconcile_loop());
        Ok(())
    }

    /// Retry a failed start: drop the cached universe and run
    /// [`Self::start`] again. No-op error if the engine is already
    /// running.
    pub async fn reload(&self) -> Result<(), MarketDataError> {
        if !self.tasks.lock().is_empty() {
            debug!("Reload requested while running, ignoring");
            return Ok(());
        }
        self.universe.invalidate();
        self.start().await
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down heatmap engine");
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "Background task did not shut down cleanly");
            }
        }
    }

    /// One-shot reference-price fetch that patches the published
    /// snapshot and seeds the baseline book.
    fn spawn_backfill(&self, symbols: Vec<String>) -> JoinHandle<()> {
        let references = Arc::clone(&self.references);
        let store = Arc::clone(&self.store);
        let baselines = Arc::clone(&self.baselines);
        let retry = self.tuning.backfill_retry.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let fetch = retry_with_backoff(&retry, "fetch_previous_closes", || {
                let references = Arc::clone(&references);
                let symbols = symbols.clone();
                async move { references.fetch_previous_closes(&symbols).await }
            });

            let closes = tokio::select! {
                () = cancel.cancelled() => return,
                result = fetch => match result {
                    Ok(closes) => closes,
                    Err(err) => {
                        // Not fatal: first ticks will anchor baselines instead.
                        warn!(error = %err, "Reference backfill exhausted retries");
                        metrics::counter!("heatmap_backfill_failures_total").increment(1);
                        return;
                    }
                },
            };

            info!(count = closes.len(), "Reference prices backfilled");
            metrics::gauge!("heatmap_reference_prices").set(closes.len() as f64);

            {
                let mut book = baselines.lock();
                for (symbol, close) in &closes {
                    book.install_reference(symbol, *close);
                }
            }

            if cancel.is_cancelled() {
                return;
            }
            store.update(|current| current.with_reference_prices(&closes, Utc::now()));
        })
    }

    /// Periodic session-volume poll. Skipped while the feed is down so
    /// a dead tape does not hammer the REST side.
    fn spawn_volume_poller(&self, symbols: Vec<String>) -> JoinHandle<()> {
        let volumes = Arc::clone(&self.volumes);
        let feed = Arc::clone(&self.feed);
        let cache = Arc::clone(&self.volume_cache);
        let poll_interval = self.tuning.volume_poll_interval;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }

                if !feed.is_connected() {
                    debug!("Feed disconnected, skipping volume poll");
                    continue;
                }

                match volumes.fetch_volumes(&symbols).await {
                    Ok(fresh) => {
                        metrics::counter!("heatmap_volume_polls_total").increment(1);
                        // Merge: symbols missing from this poll keep
                        // their last known volume.
                        cache.write().extend(fresh);
                    }
                    Err(err) => {
                        warn!(error = %err, "Volume poll failed, keeping cached volumes");
                        metrics::counter!("heatmap_volume_poll_failures_total").increment(1);
                    }
                }
            }
        })
    }

    /// The fast cycle: drain ticks, classify feed activity, and publish
    /// through the cadence gate.
    fn spawn_reconcile_loop(&self) -> JoinHandle<()> {
        let feed = Arc::clone(&self.feed);
        let store = Arc::clone(&self.store);
        let baselines = Arc::clone(&self.baselines);
        let volume_cache = Arc::clone(&self.volume_cache);
        let cancel = self.cancel.clone();
        let cycle = self.tuning.reconcile_interval;
        let cadence = ChronoDuration::from_std(self.tuning.publish_cadence)
            .unwrap_or_else(|_| ChronoDuration::seconds(5));
        let window = ChronoDuration::from_std(self.tuning.staleness_window)
            .unwrap_or_else(|_| ChronoDuration::seconds(30));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cycle);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut gate = ReconcileGate::new(cadence);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }

                let now = Utc::now();
                let ticks = feed.latest_ticks();

                let activity =
                    FeedActivity::evaluate(feed.is_connected(), feed.last_event_at(), now, window);
                store.set_stale(activity == FeedActivity::Stale);

                if !gate.should_apply(activity, now) {
                    continue;
                }

                let prev = store.current();
                if prev.is_empty() {
                    continue;
                }

                let snapshot = {
                    let mut book = baselines.lock();
                    for tick in ticks.values() {
                        book.observe_tick(tick);
                    }
                    let volumes = volume_cache.read();
                    reconcile(&prev, &ticks, &volumes, &book, now)
                };

                metrics::counter!("heatmap_reconciles_total").increment(1);
                metrics::gauge!("heatmap_ticked_symbols").set(ticks.len() as f64);
                store.replace(snapshot);
            }
        })
    }
}

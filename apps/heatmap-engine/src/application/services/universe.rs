//! Universe Service
//!
//! Caches the security universe with a TTL. Reads inside the TTL are
//! served from memory; a read past the TTL returns the cached universe
//! immediately and kicks off at most one background refresh, so callers
//! never block on a metadata round trip once the first load completed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::application::ports::{MarketDataError, UniverseSource};
use crate::domain::market::SecurityMetadata;
use crate::resilience::{RetryConfig, retry_with_backoff};

struct CachedUniverse {
    loaded_at: Instant,
    securities: Arc<Vec<SecurityMetadata>>,
}

struct Inner {
    source: Arc<dyn UniverseSource>,
    retry: RetryConfig,
    ttl: Duration,
    cache: RwLock<Option<CachedUniverse>>,
    refreshing: AtomicBool,
}

/// TTL-cached access to the security universe.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct UniverseService {
    inner: Arc<Inner>,
}

impl UniverseService {
    /// Create a service over the given source.
    #[must_use]
    pub fn new(source: Arc<dyn UniverseSource>, retry: RetryConfig, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                retry,
                ttl,
                cache: RwLock::new(None),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// The cached universe, or a fresh fetch when the cache is cold.
    ///
    /// A warm-but-expired cache is returned as-is while a background
    /// refresh runs; only the cold path can fail.
    pub async fn load(&self) -> Result<Arc<Vec<SecurityMetadata>>, MarketDataError> {
        let stale = {
            let cache = self.inner.cache.read();
            match cache.as_ref() {
                Some(entry) if entry.loaded_at.elapsed() < self.inner.ttl => {
                    return Ok(Arc::clone(&entry.securities));
                }
                Some(entry) => Some(Arc::clone(&entry.securities)),
                None => None,
            }
        };
        if let Some(stale) = stale {
            self.spawn_refresh();
            return Ok(stale);
        }

        let securities = self.inner.fetch().await?;
        self.inner.install(Arc::clone(&securities));
        Ok(securities)
    }

    /// Drop the cache so the next load refetches.
    pub fn invalidate(&self) {
        *self.inner.cache.write() = None;
    }

    fn spawn_refresh(&self) {
        // Single-flight: only one refresh at a time.
        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.fetch().await {
                Ok(securities) => inner.install(securities),
                Err(error) => {
                    warn!(%error, "Background universe refresh failed, keeping stale cache");
                }
            }
            inner.refreshing.store(false, Ordering::Release);
        });
    }
}

impl Inner {
    async fn fetch(&self) -> Result<Arc<Vec<SecurityMetadata>>, MarketDataError> {
        let source = Arc::clone(&self.source);
        let raw = retry_with_backoff(&self.retry, "fetch_universe", move || {
            let source = Arc::clone(&source);
            async move { source.fetch_universe().await }
        })
        .await?;

        let securities: Vec<SecurityMetadata> = raw
            .into_iter()
            .map(SecurityMetadata::normalized)
            .filter(|meta| !meta.symbol.is_empty())
            .collect();

        if securities.is_empty() {
            return Err(MarketDataError::Malformed(
                "universe response contained no securities".into(),
            ));
        }

        info!(count = securities.len(), "Loaded security universe");
        metrics::gauge!("heatmap_universe_size").set(securities.len() as f64);
        Ok(Arc::new(securities))
    }

    fn install(&self, securities: Arc<Vec<SecurityMetadata>>) {
        debug!(count = securities.len(), "Universe cache updated");
        *self.cache.write() = Some(CachedUniverse {
            loaded_at: Instant::now(),
            securities,
        });
    }
}

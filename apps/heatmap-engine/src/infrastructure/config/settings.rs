//! Engine Configuration Settings
//!
//! Configuration types for the heatmap engine, loaded from environment
//! variables. Every knob has a sensible default; only the market-data
//! base URL is commonly overridden.

use std::time::Duration;

use crate::application::services::engine::EngineTuning;
use crate::resilience::RetryConfig;

/// HTTP client settings for the market-data API.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Base URL of the market-data API.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Universe cache settings.
#[derive(Debug, Clone)]
pub struct UniverseSettings {
    /// How long a loaded universe stays fresh.
    pub cache_ttl: Duration,
    /// Retry budget for universe fetches. Shallow: the skeleton should
    /// paint fast, and a stale cached universe is perfectly usable.
    pub retry: RetryConfig,
}

impl Default for UniverseSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            retry: RetryConfig::shallow(),
        }
    }
}

/// Reference-price backfill settings.
#[derive(Debug, Clone)]
pub struct BackfillSettings {
    /// Retry budget for the previous-close fetch. Deeper than the
    /// universe budget since nothing waits on it.
    pub retry: RetryConfig,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            retry: RetryConfig {
                max_retries: 4,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(8),
                multiplier: 2.0,
                jitter_factor: 0.1,
            },
        }
    }
}

/// Session-volume polling settings.
#[derive(Debug, Clone)]
pub struct VolumeSettings {
    /// Interval between volume polls.
    pub poll_interval: Duration,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Reconcile loop settings.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Fast cycle interval. Bounds how quickly a feed resume shows up.
    pub cycle_interval: Duration,
    /// Steady-state spacing between published snapshots.
    pub publish_cadence: Duration,
    /// Feed silence beyond this marks the snapshot stale.
    pub staleness_window: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(1),
            publish_cadence: Duration::from_secs(5),
            staleness_window: Duration::from_secs(30),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { metrics_port: 9091 }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Market-data HTTP settings.
    pub http: HttpSettings,
    /// Universe cache settings.
    pub universe: UniverseSettings,
    /// Reference backfill settings.
    pub backfill: BackfillSettings,
    /// Volume polling settings.
    pub volume: VolumeSettings,
    /// Reconcile loop settings.
    pub reconcile: ReconcileSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `HEATMAP_API_URL` is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = match std::env::var("HEATMAP_API_URL") {
            Ok(url) if url.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("HEATMAP_API_URL".to_string()));
            }
            Ok(url) => url,
            Err(_) => HttpSettings::default().base_url,
        };

        let http = HttpSettings {
            base_url,
            timeout: parse_env_duration_secs(
                "HEATMAP_HTTP_TIMEOUT_SECS",
                HttpSettings::default().timeout,
            ),
        };

        let universe = UniverseSettings {
            cache_ttl: parse_env_duration_secs(
                "HEATMAP_UNIVERSE_TTL_SECS",
                UniverseSettings::default().cache_ttl,
            ),
            retry: RetryConfig {
                max_retries: parse_env_u32(
                    "HEATMAP_UNIVERSE_MAX_RETRIES",
                    UniverseSettings::default().retry.max_retries,
                ),
                initial_delay: parse_env_duration_millis(
                    "HEATMAP_UNIVERSE_RETRY_DELAY_MS",
                    UniverseSettings::default().retry.initial_delay,
                ),
                ..UniverseSettings::default().retry
            },
        };

        let backfill = BackfillSettings {
            retry: RetryConfig {
                max_retries: parse_env_u32(
                    "HEATMAP_BACKFILL_MAX_RETRIES",
                    BackfillSettings::default().retry.max_retries,
                ),
                initial_delay: parse_env_duration_millis(
                    "HEATMAP_BACKFILL_RETRY_DELAY_MS",
                    BackfillSettings::default().retry.initial_delay,
                ),
                ..BackfillSettings::default().retry
            },
        };

        let volume = VolumeSettings {
            poll_interval: parse_env_duration_secs(
                "HEATMAP_VOLUME_POLL_SECS",
                VolumeSettings::default().poll_interval,
            ),
        };

        let reconcile = ReconcileSettings {
            cycle_interval: parse_env_duration_secs(
                "HEATMAP_RECONCILE_CYCLE_SECS",
                ReconcileSettings::default().cycle_interval,
            ),
            publish_cadence: parse_env_duration_secs(
                "HEATMAP_PUBLISH_CADENCE_SECS",
                ReconcileSettings::default().publish_cadence,
            ),
            staleness_window: parse_env_duration_secs(
                "HEATMAP_STALENESS_WINDOW_SECS",
                ReconcileSettings::default().staleness_window,
            ),
        };

        let server = ServerSettings {
            metrics_port: parse_env_u16(
                "HEATMAP_METRICS_PORT",
                ServerSettings::default().metrics_port,
            ),
        };

        Ok(Self {
            http,
            universe,
            backfill,
            volume,
            reconcile,
            server,
        })
    }

    /// Engine timing knobs derived from this configuration.
    #[must_use]
    pub fn tuning(&self) -> EngineTuning {
        EngineTuning {
            backfill_retry: self.backfill.retry.clone(),
            volume_poll_interval: self.volume.poll_interval,
            reconcile_interval: self.reconcile.cycle_interval,
            publish_cadence: self.reconcile.publish_cadence,
            staleness_window: self.reconcile.staleness_window,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_settings_defaults() {
        let settings = HttpSettings::default();
        assert_eq!(settings.base_url, "http://localhost:8090");
        assert_eq!(settings.timeout, Duration::from_secs(10));
    }

    #[test]
    fn universe_settings_defaults() {
        let settings = UniverseSettings::default();
        assert_eq!(settings.cache_ttl, Duration::from_secs(300));
        assert_eq!(settings.retry.max_retries, 2);
        assert_eq!(settings.retry.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn backfill_retries_deeper_than_universe() {
        let universe = UniverseSettings::default();
        let backfill = BackfillSettings::default();
        assert!(backfill.retry.max_retries > universe.retry.max_retries);
    }

    #[test]
    fn reconcile_settings_defaults() {
        let settings = ReconcileSettings::default();
        assert_eq!(settings.cycle_interval, Duration::from_secs(1));
        assert_eq!(settings.publish_cadence, Duration::from_secs(5));
        assert_eq!(settings.staleness_window, Duration::from_secs(30));
    }

    #[test]
    fn tuning_mirrors_config() {
        let config = EngineConfig::default();
        let tuning = config.tuning();
        assert_eq!(tuning.volume_poll_interval, config.volume.poll_interval);
        assert_eq!(tuning.publish_cadence, config.reconcile.publish_cadence);
        assert_eq!(tuning.staleness_window, config.reconcile.staleness_window);
    }
}

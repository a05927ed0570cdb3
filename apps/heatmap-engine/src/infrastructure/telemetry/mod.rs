//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging.
///
/// Respects `RUST_LOG`; defaults to `info` for this crate and `warn`
/// for dependencies. Safe to call once at startup.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,heatmap_engine=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();
}

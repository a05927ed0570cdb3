//! Infrastructure Layer
//!
//! Adapters binding the application ports to the outside world: the
//! HTTP market-data client, the in-memory tick feed state, environment
//! configuration, logging, and Prometheus metrics.

pub mod config;
pub mod feed;
pub mod http;
pub mod metrics;
pub mod telemetry;

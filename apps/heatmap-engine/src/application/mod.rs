//! Application Layer
//!
//! Orchestrates the heatmap lifecycle over the domain model. Ports
//! describe what the engine needs from the outside world; services
//! contain the reconciliation logic and the background tasks that
//! drive it.

pub mod ports;
pub mod services;

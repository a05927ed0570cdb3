//! Application services.

pub mod engine;
pub mod reconciler;
pub mod store;
pub mod universe;

pub use engine::HeatmapEngine;
pub use reconciler::{BaselineBook, FeedActivity, ReconcileGate, reconcile};
pub use store::SnapshotStore;
pub use universe::UniverseService;

//! Domain Layer - Core market types and pure computation.
//!
//! This layer contains the heatmap's data model and the derived-metric
//! math, with no I/O and no async. All types here are plain Rust with
//! serialization support.

/// Security metadata, trade ticks and symbol normalization.
pub mod market;

/// Sector-grouped snapshot model.
pub mod snapshot;

/// Synthetic visual-weight derivation.
pub mod size;

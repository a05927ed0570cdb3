//! Configuration loaded from environment variables.

mod settings;

pub use settings::{
    BackfillSettings, ConfigError, EngineConfig, HttpSettings, ReconcileSettings, ServerSettings,
    UniverseSettings, VolumeSettings,
};

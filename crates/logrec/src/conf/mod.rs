//! Conf module: configuration model, loading, and per-source overrides.

pub mod model;
pub mod load;
pub mod group;

pub use model::{ConfigError, EngineConfig, OutputConfig, SourceOverride};

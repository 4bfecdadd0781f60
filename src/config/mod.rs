//! Configuration merge system
//!
//! Implements the 3-layer configuration merge:
//! 1. Built-in defaults
//! 2. Config file (layercast.toml, or `--config PATH`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::BuiltinDefaults;
pub use effective::{
    ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, DEFAULT_CONFIG_FILE,
    EFFECTIVE_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    ArtifactSettings, DistributeSettings, DistributeTargets, LoggingSettings, RegistrySettings,
    Settings,
};

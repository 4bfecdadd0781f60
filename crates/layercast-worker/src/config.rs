//! Worker configuration.

use std::path::PathBuf;

use crate::logging::LogFormat;

/// Environment variable naming the artifact store root.
pub const ENV_ARTIFACT_ROOT: &str = "LAYERCAST_ARTIFACT_ROOT";
/// Environment variable naming the regional registry root.
pub const ENV_REGISTRY_ROOT: &str = "LAYERCAST_REGISTRY_ROOT";
/// Environment variable naming the account id used in ARNs.
pub const ENV_ACCOUNT_ID: &str = "LAYERCAST_ACCOUNT_ID";
/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "LAYERCAST_LOG_FORMAT";

/// Worker configuration settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the artifact store (`<root>/<bucket>/<key>`).
    pub artifact_root: PathBuf,
    /// Root of the regional layer registry.
    pub registry_root: PathBuf,
    /// Account id used when building layer ARNs.
    pub account_id: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from("/var/lib/layercast/artifacts"),
            registry_root: PathBuf::from("/var/lib/layercast/regions"),
            account_id: crate::registry::DEFAULT_ACCOUNT_ID.to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl WorkerConfig {
    /// Defaults overridden by the `LAYERCAST_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup(ENV_ARTIFACT_ROOT) {
            config.artifact_root = PathBuf::from(root);
        }
        if let Some(root) = lookup(ENV_REGISTRY_ROOT) {
            config.registry_root = PathBuf::from(root);
        }
        if let Some(account_id) = lookup(ENV_ACCOUNT_ID) {
            config.account_id = account_id;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).and_then(|f| f.parse().ok()) {
            config.log_format = format;
        }
        config
    }
}

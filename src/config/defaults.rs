//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde::{Deserialize, Serialize};

use layercast_worker::registry::DEFAULT_ACCOUNT_ID;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Regions the Distribute stage fans out to
    pub regions: Vec<String>,

    /// Principal granted layer usage (default: the registry's own account)
    pub layer_principal: String,

    /// Organization scope for the grant (default: none)
    pub organization_id: String,

    /// Artifact store root directory
    pub artifact_store_root: String,

    /// Bucket holding the build output
    pub artifact_bucket: String,

    /// Object key of the build output zip
    pub artifact_key: String,

    /// Regional registry root directory
    pub registry_root: String,

    /// Account id used in layer ARNs
    pub registry_account_id: String,

    /// Log format (default: "pretty")
    pub log_format: String,

    /// Log level used when RUST_LOG is unset (default: "info")
    pub log_level: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            regions: ["eu-central-1", "eu-west-1", "us-west-1", "us-east-1"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
            layer_principal: DEFAULT_ACCOUNT_ID.to_string(),
            organization_id: String::new(),
            artifact_store_root: "/var/lib/layercast/artifacts".to_string(),
            artifact_bucket: "layercast-artifacts".to_string(),
            artifact_key: "BuildOutput/layer.zip".to_string(),
            registry_root: "/var/lib/layercast/regions".to_string(),
            registry_account_id: DEFAULT_ACCOUNT_ID.to_string(),
            log_format: "pretty".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "distribute": {
                "regions": self.regions,
                "layer_principal": self.layer_principal,
                "organization_id": self.organization_id
            },
            "artifact": {
                "store_root": self.artifact_store_root,
                "bucket": self.artifact_bucket,
                "key": self.artifact_key
            },
            "registry": {
                "root": self.registry_root,
                "account_id": self.registry_account_id
            },
            "logging": {
                "format": self.log_format,
                "level": self.log_level
            }
        })
    }
}

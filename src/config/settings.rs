//! Typed settings decoded from the merged configuration.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use layercast_protocol::{ArtifactLocation, OrganizationId, Principal, Region};
use layercast_worker::registry::validate_grant_target;
use layercast_worker::LogFormat;

use super::effective::ConfigError;

/// All settings the host side runs with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub distribute: DistributeSettings,
    pub artifact: ArtifactSettings,
    pub registry: RegistrySettings,
    pub logging: LoggingSettings,
}

/// `[distribute]`: where the layer goes and who may use it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributeSettings {
    pub regions: Vec<String>,
    pub layer_principal: String,
    /// Empty or absent means no organization scope.
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// `[artifact]`: the build output every region receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSettings {
    pub store_root: PathBuf,
    pub bucket: String,
    pub key: String,
}

/// `[registry]`: the on-disk regional layer registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    pub root: PathBuf,
    pub account_id: String,
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub level: String,
}

/// Validated distribution targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributeTargets {
    pub regions: Vec<Region>,
    pub principal: Principal,
    pub organization_id: Option<OrganizationId>,
}

impl DistributeTargets {
    /// A wildcard principal with no organization scope shares the layer
    /// with every account.
    pub fn is_public(&self) -> bool {
        self.principal.is_wildcard() && self.organization_id.is_none()
    }
}

impl Settings {
    /// Decode settings from a merged configuration value.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Self::deserialize(value).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate the `[distribute]` section.
    ///
    /// Requires at least one region, every region well-formed and listed
    /// once, and a principal and organization id the registry will accept
    /// when granting. A target that passes here never publishes a version
    /// the grant then refuses.
    pub fn targets(&self) -> Result<DistributeTargets, ConfigError> {
        let distribute = &self.distribute;
        if distribute.regions.is_empty() {
            return Err(ConfigError::ValidationError(
                "distribute.regions must list at least one region".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut regions = Vec::with_capacity(distribute.regions.len());
        for code in &distribute.regions {
            let region = Region::new(code.as_str()).map_err(|e| {
                ConfigError::ValidationError(format!("distribute.regions: {}", e))
            })?;
            if !seen.insert(region.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "distribute.regions lists '{}' more than once",
                    region
                )));
            }
            regions.push(region);
        }

        let principal = Principal::new(distribute.layer_principal.as_str()).map_err(|e| {
            ConfigError::ValidationError(format!("distribute.layer_principal: {}", e))
        })?;
        let organization_id = OrganizationId::optional(distribute.organization_id.as_deref())
            .map_err(|e| ConfigError::ValidationError(format!("distribute.organization_id: {}", e)))?;
        validate_grant_target(&principal, organization_id.as_ref())
            .map_err(|e| ConfigError::ValidationError(format!("distribute: {}", e)))?;

        Ok(DistributeTargets {
            regions,
            principal,
            organization_id,
        })
    }

    /// Location of the build output in the artifact store.
    pub fn artifact_location(&self) -> ArtifactLocation {
        ArtifactLocation::s3(self.artifact.bucket.as_str(), self.artifact.key.as_str())
    }
}

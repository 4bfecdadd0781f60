//! Interfaces of the services a worker consumes, and the values passed
//! across them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use layercast_protocol::layer::{PERMISSION_ACTION, STATEMENT_ID};
use layercast_protocol::{ArtifactLocation, JobOutcome, LayerDefinition, OrganizationId, Principal, Region};

use crate::error::{GrantError, PublishError, ReportError, StoreError};

/// Raw bytes of a build output (a zip archive).
///
/// Owned by a single worker invocation and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerArtifact {
    bytes: Vec<u8>,
}

impl LayerArtifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Input of a publish call.
#[derive(Debug, Clone, Copy)]
pub struct PublishLayerVersionInput<'a> {
    pub definition: &'a LayerDefinition,
    pub zip_file: &'a [u8],
}

/// Content summary of a published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayerVersionContent {
    /// Base64 SHA-256 of the zip.
    pub code_sha256: String,
    pub code_size: u64,
}

/// A layer version as returned by the Regional Publisher.
///
/// Version numbers are assigned per region and say nothing about the
/// same layer in any other region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublishedLayerVersion {
    pub layer_name: String,
    pub layer_arn: String,
    pub layer_version_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    pub description: String,
    pub created_date: DateTime<Utc>,
    pub compatible_runtimes: Vec<String>,
    pub license_info: String,
    pub content: LayerVersionContent,
}

/// A usage grant on one published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionGrant {
    pub layer_name: String,
    pub version_number: u64,
    pub statement_id: String,
    pub action: String,
    pub principal: Principal,
    /// Omitted from the call entirely when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,
}

impl PermissionGrant {
    /// Grant for `version_number` with the fixed action and statement id.
    pub fn new(
        layer_name: impl Into<String>,
        version_number: u64,
        principal: Principal,
        organization_id: Option<OrganizationId>,
    ) -> Self {
        Self {
            layer_name: layer_name.into(),
            version_number,
            statement_id: STATEMENT_ID.to_string(),
            action: PERMISSION_ACTION.to_string(),
            principal,
            organization_id,
        }
    }
}

/// Result of a successful grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrantReceipt {
    /// The policy statement as stored, JSON-encoded.
    pub statement: String,
    pub revision_id: String,
}

/// Artifact Store Client.
pub trait ArtifactStore: Send + Sync {
    fn get(&self, location: &ArtifactLocation) -> Result<LayerArtifact, StoreError>;
}

/// Regional Publisher, bound to one region for its whole lifetime.
pub trait RegionalPublisher {
    fn publish_layer_version(
        &self,
        input: &PublishLayerVersionInput<'_>,
    ) -> Result<PublishedLayerVersion, PublishError>;
}

/// Permission Grantor, bound to the same region as its publisher.
pub trait PermissionGrantor {
    fn add_layer_version_permission(&self, grant: &PermissionGrant) -> Result<GrantReceipt, GrantError>;
}

/// A regional client: publisher and grantor over one region binding.
pub trait RegionalClient: RegionalPublisher + PermissionGrantor {}

impl<T: RegionalPublisher + PermissionGrantor> RegionalClient for T {}

/// Builds a fresh regional client per worker invocation.
pub trait RegionConnector: Send + Sync {
    fn connect(&self, region: &Region) -> Box<dyn RegionalClient>;
}

/// Job Reporter: the pipeline's job result channel.
pub trait JobReporter: Send + Sync {
    fn report(&self, outcome: &JobOutcome) -> Result<(), ReportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_omits_absent_organization() {
        let grant = PermissionGrant::new("sample-layer", 3, Principal::new("123456789012").unwrap(), None);
        let json = serde_json::to_value(&grant).unwrap();

        assert!(json.get("OrganizationId").is_none());
        assert_eq!(json["VersionNumber"], 3);
        assert_eq!(json["StatementId"], "layer-policy");
        assert_eq!(json["Action"], "lambda:GetLayerVersion");
        assert_eq!(json["Principal"], "123456789012");
    }

    #[test]
    fn test_grant_includes_organization() {
        let grant = PermissionGrant::new(
            "sample-layer",
            1,
            Principal::new("*").unwrap(),
            Some(OrganizationId::new("o-abc123").unwrap()),
        );
        let json = serde_json::to_value(&grant).unwrap();
        assert_eq!(json["OrganizationId"], "o-abc123");
    }
}

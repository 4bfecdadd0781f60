//! Mock service state for testing.
//!
//! Provides in-memory implementations of every service a worker consumes:
//! artifacts, per-region layer versions and grants, and reported job
//! results, plus call counters and failure injection. Each regional client
//! it hands out is bound to one region; the shared state exists only so
//! tests can observe what the worker did.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use layercast_protocol::{ArtifactLocation, JobOutcome, Region};

use crate::error::{GrantError, PublishError, ReportError, StoreError};
use crate::registry::code_sha256;
use crate::services::{
    ArtifactStore, GrantReceipt, JobReporter, LayerArtifact, LayerVersionContent, PermissionGrant,
    PermissionGrantor, PublishLayerVersionInput, PublishedLayerVersion, RegionConnector,
    RegionalClient, RegionalPublisher,
};

/// Account id used in mock ARNs.
pub const MOCK_ACCOUNT_ID: &str = "111122223333";

/// Thread-safe mock service state.
#[derive(Debug, Clone)]
pub struct MockState {
    inner: Arc<RwLock<MockStateInner>>,
}

#[derive(Debug, Default)]
struct MockStateInner {
    /// Artifacts by (bucket, key).
    artifacts: HashMap<(String, String), Vec<u8>>,
    /// Published versions by region, in publish order.
    versions: HashMap<String, Vec<PublishedLayerVersion>>,
    /// Next version number to hand out, by region.
    next_version: HashMap<String, u64>,
    /// Applied grants by region.
    grants: HashMap<String, Vec<PermissionGrant>>,
    /// Every outcome passed to the reporter.
    reported: Vec<JobOutcome>,
    calls: CallCounts,
    failure_injection: FailureInjection,
}

#[derive(Debug, Clone, Copy, Default)]
struct CallCounts {
    store_get: u32,
    publish: u32,
    grant: u32,
    report: u32,
}

/// Artifact Store failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    NotFound,
    TransientIo,
}

/// Regional Publisher failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFailure {
    Throttled,
    InvalidContent,
    PermissionDenied,
}

/// Permission Grantor failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantFailure {
    InvalidPrincipal,
    PermissionDenied,
}

/// Failure injection configuration.
///
/// Regional failures keyed by region code apply to that region only; the
/// `*_all` entries apply everywhere else.
#[derive(Debug, Clone, Default)]
struct FailureInjection {
    store: Option<StoreFailure>,
    publish_all: Option<PublishFailure>,
    publish_in: HashMap<String, PublishFailure>,
    grant_all: Option<GrantFailure>,
    grant_in: HashMap<String, GrantFailure>,
    /// Publish succeeds but returns no version number.
    omit_version: bool,
    /// The job result channel is down.
    report_unreachable: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    /// Create a new mock state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockStateInner::default())),
        }
    }

    pub fn fail_store(&self, failure: StoreFailure) {
        self.inner.write().unwrap().failure_injection.store = Some(failure);
    }

    pub fn fail_publish(&self, failure: PublishFailure) {
        self.inner.write().unwrap().failure_injection.publish_all = Some(failure);
    }

    pub fn fail_publish_in(&self, region: &str, failure: PublishFailure) {
        self.inner
            .write()
            .unwrap()
            .failure_injection
            .publish_in
            .insert(region.to_string(), failure);
    }

    pub fn fail_grant(&self, failure: GrantFailure) {
        self.inner.write().unwrap().failure_injection.grant_all = Some(failure);
    }

    pub fn fail_grant_in(&self, region: &str, failure: GrantFailure) {
        self.inner
            .write()
            .unwrap()
            .failure_injection
            .grant_in
            .insert(region.to_string(), failure);
    }

    pub fn omit_version(&self) {
        self.inner.write().unwrap().failure_injection.omit_version = true;
    }

    pub fn fail_report(&self) {
        self.inner.write().unwrap().failure_injection.report_unreachable = true;
    }

    // === Artifacts ===

    /// Store artifact bytes under `bucket`/`key`.
    pub fn put_artifact(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        let mut inner = self.inner.write().unwrap();
        inner.artifacts.insert((bucket.to_string(), key.to_string()), bytes);
    }

    // === Layer versions ===

    /// Override the next version number handed out in `region`.
    pub fn set_next_version(&self, region: &str, version: u64) {
        let mut inner = self.inner.write().unwrap();
        inner.next_version.insert(region.to_string(), version);
    }

    /// Versions published in `region`, oldest first.
    pub fn published(&self, region: &str) -> Vec<PublishedLayerVersion> {
        let inner = self.inner.read().unwrap();
        inner.versions.get(region).cloned().unwrap_or_default()
    }

    /// Grants applied in `region`, oldest first.
    pub fn grants(&self, region: &str) -> Vec<PermissionGrant> {
        let inner = self.inner.read().unwrap();
        inner.grants.get(region).cloned().unwrap_or_default()
    }

    /// Outcomes handed to the reporter, in order.
    pub fn reported(&self) -> Vec<JobOutcome> {
        self.inner.read().unwrap().reported.clone()
    }

    // === Call counts ===

    pub fn store_calls(&self) -> u32 {
        self.inner.read().unwrap().calls.store_get
    }

    pub fn publish_calls(&self) -> u32 {
        self.inner.read().unwrap().calls.publish
    }

    pub fn grant_calls(&self) -> u32 {
        self.inner.read().unwrap().calls.grant
    }

    pub fn report_calls(&self) -> u32 {
        self.inner.read().unwrap().calls.report
    }

    fn publish(
        &self,
        region: &Region,
        input: &PublishLayerVersionInput<'_>,
    ) -> Result<PublishedLayerVersion, PublishError> {
        let mut inner = self.inner.write().unwrap();
        inner.calls.publish += 1;

        let injection = &inner.failure_injection;
        let failure = injection
            .publish_in
            .get(region.as_str())
            .copied()
            .or(injection.publish_all);
        let omit_version = injection.omit_version;

        if let Some(failure) = failure {
            return Err(match failure {
                PublishFailure::Throttled => PublishError::Throttled {
                    region: region.to_string(),
                },
                PublishFailure::InvalidContent => PublishError::InvalidContent {
                    reason: "uploaded file must be a non-empty zip".to_string(),
                },
                PublishFailure::PermissionDenied => PublishError::PermissionDenied {
                    region: region.to_string(),
                    reason: "not authorized to perform lambda:PublishLayerVersion".to_string(),
                },
            });
        }

        let next = inner.next_version.entry(region.to_string()).or_insert(1);
        let version = *next;
        *next += 1;

        let definition = input.definition;
        let layer_arn = format!(
            "arn:aws:lambda:{}:{}:layer:{}",
            region, MOCK_ACCOUNT_ID, definition.layer_name
        );
        let published = PublishedLayerVersion {
            layer_name: definition.layer_name.clone(),
            layer_version_arn: format!("{}:{}", layer_arn, version),
            layer_arn,
            version: if omit_version { None } else { Some(version) },
            description: definition.description.clone(),
            created_date: Utc::now(),
            compatible_runtimes: definition.compatible_runtimes.clone(),
            license_info: definition.license_info.clone(),
            content: LayerVersionContent {
                code_sha256: code_sha256(input.zip_file),
                code_size: input.zip_file.len() as u64,
            },
        };

        inner
            .versions
            .entry(region.to_string())
            .or_default()
            .push(published.clone());
        Ok(published)
    }

    fn grant(&self, region: &Region, grant: &PermissionGrant) -> Result<GrantReceipt, GrantError> {
        let mut inner = self.inner.write().unwrap();
        inner.calls.grant += 1;

        let injection = &inner.failure_injection;
        let failure = injection
            .grant_in
            .get(region.as_str())
            .copied()
            .or(injection.grant_all);

        if let Some(failure) = failure {
            return Err(match failure {
                GrantFailure::InvalidPrincipal => GrantError::InvalidPrincipal {
                    principal: grant.principal.to_string(),
                    reason: "principal is not an account, account ARN, or *".to_string(),
                },
                GrantFailure::PermissionDenied => GrantError::PermissionDenied {
                    region: region.to_string(),
                    reason: "not authorized to perform lambda:AddLayerVersionPermission".to_string(),
                },
            });
        }

        let statement = serde_json::to_string(grant).unwrap_or_default();
        let grants = inner.grants.entry(region.to_string()).or_default();
        grants.push(grant.clone());
        Ok(GrantReceipt {
            statement,
            revision_id: format!("rev-{:04}", grants.len()),
        })
    }
}

impl ArtifactStore for MockState {
    fn get(&self, location: &ArtifactLocation) -> Result<LayerArtifact, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.calls.store_get += 1;

        match inner.failure_injection.store {
            Some(StoreFailure::NotFound) => {
                return Err(StoreError::NotFound {
                    location: location.to_string(),
                })
            }
            Some(StoreFailure::TransientIo) => {
                return Err(StoreError::TransientIo {
                    location: location.to_string(),
                    source: io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"),
                })
            }
            None => {}
        }

        inner
            .artifacts
            .get(&(location.bucket().to_string(), location.key().to_string()))
            .map(|bytes| LayerArtifact::new(bytes.clone()))
            .ok_or_else(|| StoreError::NotFound {
                location: location.to_string(),
            })
    }
}

impl JobReporter for MockState {
    fn report(&self, outcome: &JobOutcome) -> Result<(), ReportError> {
        let mut inner = self.inner.write().unwrap();
        inner.calls.report += 1;

        if inner.failure_injection.report_unreachable {
            return Err(ReportError::Unreachable(io::Error::new(
                io::ErrorKind::TimedOut,
                "job result endpoint timed out",
            )));
        }

        inner.reported.push(outcome.clone());
        Ok(())
    }
}

impl RegionConnector for MockState {
    fn connect(&self, region: &Region) -> Box<dyn RegionalClient> {
        Box::new(MockRegionalClient {
            region: region.clone(),
            state: self.clone(),
        })
    }
}

/// Regional client over [`MockState`], bound to one region.
#[derive(Debug, Clone)]
pub struct MockRegionalClient {
    region: Region,
    state: MockState,
}

impl RegionalPublisher for MockRegionalClient {
    fn publish_layer_version(
        &self,
        input: &PublishLayerVersionInput<'_>,
    ) -> Result<PublishedLayerVersion, PublishError> {
        self.state.publish(&self.region, input)
    }
}

impl PermissionGrantor for MockRegionalClient {
    fn add_layer_version_permission(&self, grant: &PermissionGrant) -> Result<GrantReceipt, GrantError> {
        self.state.grant(&self.region, grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layercast_protocol::{JobId, LayerDefinition, Principal};

    #[test]
    fn test_versions_are_per_region() {
        let state = MockState::new();
        let def = LayerDefinition::deployed();
        let input = PublishLayerVersionInput {
            definition: &def,
            zip_file: b"PK\x03\x04",
        };

        let east = state.connect(&Region::new("us-east-1").unwrap());
        let west = state.connect(&Region::new("eu-west-1").unwrap());

        assert_eq!(east.publish_layer_version(&input).unwrap().version, Some(1));
        assert_eq!(east.publish_layer_version(&input).unwrap().version, Some(2));
        assert_eq!(west.publish_layer_version(&input).unwrap().version, Some(1));
        assert_eq!(state.publish_calls(), 3);
        assert_eq!(state.published("us-east-1").len(), 2);
    }

    #[test]
    fn test_region_specific_failure() {
        let state = MockState::new();
        state.fail_publish_in("eu-west-1", PublishFailure::Throttled);
        let def = LayerDefinition::deployed();
        let input = PublishLayerVersionInput {
            definition: &def,
            zip_file: b"PK\x03\x04",
        };

        let west = state.connect(&Region::new("eu-west-1").unwrap());
        let east = state.connect(&Region::new("us-east-1").unwrap());
        assert!(matches!(
            west.publish_layer_version(&input),
            Err(PublishError::Throttled { .. })
        ));
        assert!(east.publish_layer_version(&input).is_ok());
    }

    #[test]
    fn test_grant_recorded_per_region() {
        let state = MockState::new();
        let client = state.connect(&Region::new("us-east-1").unwrap());
        let grant = PermissionGrant::new("sample-layer", 1, Principal::new("*").unwrap(), None);

        client.add_layer_version_permission(&grant).unwrap();
        assert_eq!(state.grants("us-east-1"), vec![grant]);
        assert!(state.grants("eu-west-1").is_empty());
    }

    #[test]
    fn test_report_unreachable() {
        let state = MockState::new();
        state.fail_report();
        let outcome = JobOutcome::success(JobId::new("j").unwrap());
        assert!(matches!(state.report(&outcome), Err(ReportError::Unreachable(_))));
        assert_eq!(state.report_calls(), 1);
        assert!(state.reported().is_empty());
    }

    #[test]
    fn test_missing_artifact() {
        let state = MockState::new();
        let err = state.get(&ArtifactLocation::s3("b", "missing.zip")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(state.store_calls(), 1);
    }
}

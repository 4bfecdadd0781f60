//! Regional distribution worker.
//!
//! Runs the four steps of one invocation strictly in order:
//!
//! 1. retrieve the artifact
//! 2. publish it as a new layer version in the request's region
//! 3. grant usage permission on that version
//! 4. report the job outcome
//!
//! Failures in 1–3 become a generic `Failure` outcome; the error itself only
//! goes to the log. Nothing is retried and nothing is rolled back: a version
//! published before a failed grant stays published.

use thiserror::Error;
use tracing::{error, info, info_span, warn};

use layercast_protocol::{
    FailureType, JobOutcome, LayerDefinition, OutcomeWarning, DISTRIBUTION_FAILED_MESSAGE,
};

use crate::error::{GrantError, PublishError, ReportError, StoreError};
use crate::request::DistributionRequest;
use crate::services::{
    ArtifactStore, JobReporter, PermissionGrant, PublishLayerVersionInput, RegionConnector,
};

/// Why a distribution did not succeed.
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("artifact unavailable: {0}")]
    ArtifactUnavailable(#[from] StoreError),

    #[error("publish rejected: {0}")]
    PublishRejected(#[from] PublishError),

    #[error("grant rejected: {0}")]
    GrantRejected(#[from] GrantError),

    #[error("reporting unreachable: {0}")]
    ReportingUnreachable(#[from] ReportError),
}

/// One regional distribution worker.
///
/// Holds no per-request state; every call to [`Distributor::distribute`]
/// connects its own regional client.
pub struct Distributor<'a> {
    store: &'a dyn ArtifactStore,
    regions: &'a dyn RegionConnector,
    reporter: &'a dyn JobReporter,
    layer: LayerDefinition,
}

impl<'a> Distributor<'a> {
    pub fn new(
        store: &'a dyn ArtifactStore,
        regions: &'a dyn RegionConnector,
        reporter: &'a dyn JobReporter,
    ) -> Self {
        Self {
            store,
            regions,
            reporter,
            layer: LayerDefinition::deployed(),
        }
    }

    /// Distribute and report. Exactly one outcome is reported per call.
    ///
    /// Only a failure of the reporting channel itself is returned as an
    /// error; the pipeline will time the job out.
    pub fn handle(&self, request: &DistributionRequest) -> Result<JobOutcome, DistributionError> {
        let outcome = self.distribute(request);
        self.reporter.report(&outcome)?;
        Ok(outcome)
    }

    /// Publish the artifact in the request's region and grant permission on
    /// the new version, without reporting.
    pub fn distribute(&self, request: &DistributionRequest) -> JobOutcome {
        let span = info_span!("distribute", job_id = %request.job_id, region = %request.region);
        let _guard = span.enter();

        match self.try_distribute(request) {
            Ok(warning) => JobOutcome::Success {
                job_id: request.job_id.clone(),
                warning,
            },
            Err(err) => {
                error!(error = %err, detail = ?err, "layer distribution failed");
                JobOutcome::failure(
                    request.job_id.clone(),
                    DISTRIBUTION_FAILED_MESSAGE,
                    FailureType::JobFailed,
                )
            }
        }
    }

    fn try_distribute(
        &self,
        request: &DistributionRequest,
    ) -> Result<Option<OutcomeWarning>, DistributionError> {
        let artifact = self.store.get(&request.artifact_location)?;

        let client = self.regions.connect(&request.region);
        let published = client.publish_layer_version(&PublishLayerVersionInput {
            definition: &self.layer,
            zip_file: artifact.as_bytes(),
        })?;
        info!(
            layer_version_arn = %published.layer_version_arn,
            version = ?published.version,
            code_size = published.content.code_size,
            "layer published"
        );

        // A zero version is as good as none.
        let Some(version) = published.version.filter(|v| *v > 0) else {
            let warning = OutcomeWarning::PublishedWithoutVersion;
            warn!(layer_arn = %published.layer_arn, "{}", warning.description());
            return Ok(Some(warning));
        };

        let grant = PermissionGrant::new(
            &self.layer.layer_name,
            version,
            request.principal.clone(),
            request.organization_scope.clone(),
        );
        let receipt = client.add_layer_version_permission(&grant)?;
        info!(
            version,
            statement = %receipt.statement,
            revision_id = %receipt.revision_id,
            "permissions applied"
        );

        Ok(None)
    }
}

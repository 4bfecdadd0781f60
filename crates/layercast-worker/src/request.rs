//! Distribution requests.

use layercast_protocol::{
    ArtifactLocation, IdError, JobEvent, JobId, OrganizationId, PayloadError, Principal, Region,
};

/// Everything one worker invocation needs, decoded from a job invocation.
///
/// Immutable once built and consumed by exactly one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRequest {
    pub artifact_location: ArtifactLocation,
    pub job_id: JobId,
    pub region: Region,
    pub principal: Principal,
    pub organization_scope: Option<OrganizationId>,
}

impl DistributionRequest {
    /// Decode a request from a job invocation.
    pub fn from_event(event: &JobEvent) -> Result<Self, PayloadError> {
        let raw_job_id = event.job_id();
        let invalid = |source: IdError| PayloadError::InvalidParameter {
            job_id: raw_job_id.to_string(),
            source,
        };

        let job_id = JobId::new(raw_job_id).map_err(invalid)?;
        let artifact_location = event.input_location()?.clone();
        let params = event.user_parameters()?;

        Ok(Self {
            artifact_location,
            job_id,
            region: Region::new(params.region).map_err(invalid)?,
            principal: Principal::new(params.layer_principal).map_err(invalid)?,
            organization_scope: OrganizationId::optional(params.organization_id.as_deref())
                .map_err(invalid)?,
        })
    }
}

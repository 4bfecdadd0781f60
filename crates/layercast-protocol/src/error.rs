//! Error types for reading job invocations.

use thiserror::Error;

use crate::ids::IdError;

/// Errors raised while decoding a job invocation payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload is not valid JSON or does not match the invocation schema.
    #[error("malformed job invocation: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The invocation carries no input artifact.
    #[error("job {job_id} has no input artifact")]
    MissingInputArtifact { job_id: String },

    /// The `UserParameters` string is not the expected JSON document.
    #[error("job {job_id} has invalid user parameters: {reason}")]
    InvalidUserParameters { job_id: String, reason: String },

    /// A user parameter failed validation.
    #[error("job {job_id}: {source}")]
    InvalidParameter {
        job_id: String,
        #[source]
        source: IdError,
    },
}

impl PayloadError {
    /// Job id of the invocation, when it was readable.
    ///
    /// A malformed payload has no trustworthy job id and cannot be reported.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            PayloadError::Malformed(_) => None,
            PayloadError::MissingInputArtifact { job_id }
            | PayloadError::InvalidUserParameters { job_id, .. }
            | PayloadError::InvalidParameter { job_id, .. } => Some(job_id),
        }
    }
}

//! Job outcomes and the job result sent back to the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::JobId;

/// Failure category understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureType {
    JobFailed,
    ConfigurationError,
    PermissionError,
    RevisionOutOfSync,
    RevisionUnavailable,
    SystemUnavailable,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobFailed => write!(f, "JobFailed"),
            Self::ConfigurationError => write!(f, "ConfigurationError"),
            Self::PermissionError => write!(f, "PermissionError"),
            Self::RevisionOutOfSync => write!(f, "RevisionOutOfSync"),
            Self::RevisionUnavailable => write!(f, "RevisionUnavailable"),
            Self::SystemUnavailable => write!(f, "SystemUnavailable"),
        }
    }
}

/// Something worth flagging about an otherwise successful distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeWarning {
    /// Publish succeeded but returned no version number, so no permission
    /// was granted.
    PublishedWithoutVersion,
}

impl OutcomeWarning {
    pub fn description(&self) -> &'static str {
        match self {
            Self::PublishedWithoutVersion => "layer published without a version number; permission not granted",
        }
    }
}

/// Terminal result of one distribution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<OutcomeWarning>,
    },
    Failure {
        job_id: JobId,
        message: String,
        kind: FailureType,
    },
}

impl JobOutcome {
    pub fn success(job_id: JobId) -> Self {
        Self::Success { job_id, warning: None }
    }

    pub fn failure(job_id: JobId, message: impl Into<String>, kind: FailureType) -> Self {
        Self::Failure {
            job_id,
            message: message.into(),
            kind,
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Success { job_id, .. } | Self::Failure { job_id, .. } => job_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn warning(&self) -> Option<OutcomeWarning> {
        match self {
            Self::Success { warning, .. } => *warning,
            Self::Failure { .. } => None,
        }
    }

    /// The job result as the pipeline receives it.
    pub fn to_result(&self) -> JobResult {
        match self {
            Self::Success { job_id, .. } => JobResult {
                job_id: job_id.clone(),
                failure_details: None,
            },
            Self::Failure { job_id, message, kind } => JobResult {
                job_id: job_id.clone(),
                failure_details: Some(FailureDetails {
                    kind: *kind,
                    message: message.clone(),
                }),
            },
        }
    }
}

/// Failure details attached to a failed job result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetails {
    #[serde(rename = "type")]
    pub kind: FailureType,
    pub message: String,
}

/// Job result wire format.
///
/// Success results carry nothing but the job id; warnings stay on the
/// worker side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_details: Option<FailureDetails>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.failure_details.is_none()
    }
}

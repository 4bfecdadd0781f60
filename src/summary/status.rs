//! Stage and action statuses

use serde::{Deserialize, Serialize};

use layercast_protocol::JobOutcome;

/// Stage status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Every action succeeded
    Success,
    /// At least one action failed or went unreported
    Failed,
}

impl Status {
    /// Process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            Status::Success => 0,
            Status::Failed => 1,
        }
    }
}

/// Status of one regional action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    /// Succeeded, but something needs attention (see the worker logs)
    SuccessWithWarning,
    Failed,
    /// No job result reached the ledger
    Unreported,
}

impl ActionStatus {
    pub fn from_outcome(outcome: &JobOutcome) -> Self {
        match outcome {
            JobOutcome::Success { warning: None, .. } => ActionStatus::Success,
            JobOutcome::Success { warning: Some(_), .. } => ActionStatus::SuccessWithWarning,
            JobOutcome::Failure { .. } => ActionStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionStatus::Success | ActionStatus::SuccessWithWarning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layercast_protocol::{FailureType, JobId, OutcomeWarning};

    #[test]
    fn test_from_outcome() {
        let job_id = JobId::new("job-1").unwrap();
        assert_eq!(
            ActionStatus::from_outcome(&JobOutcome::success(job_id.clone())),
            ActionStatus::Success
        );
        assert_eq!(
            ActionStatus::from_outcome(&JobOutcome::Success {
                job_id: job_id.clone(),
                warning: Some(OutcomeWarning::PublishedWithoutVersion),
            }),
            ActionStatus::SuccessWithWarning
        );
        assert_eq!(
            ActionStatus::from_outcome(&JobOutcome::failure(job_id, "failed", FailureType::JobFailed)),
            ActionStatus::Failed
        );
    }

    #[test]
    fn test_serialization() {
        assert_eq!(
            serde_json::to_string(&ActionStatus::SuccessWithWarning).unwrap(),
            "\"success_with_warning\""
        );
        assert_eq!(serde_json::to_string(&Status::Failed).unwrap(), "\"failed\"");
    }

    #[test]
    fn test_warning_counts_as_success() {
        assert!(ActionStatus::SuccessWithWarning.is_success());
        assert!(!ActionStatus::Unreported.is_success());
    }
}

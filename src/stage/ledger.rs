//! In-process job result channel for the Distribute stage.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{info, warn};

use layercast_protocol::{JobId, JobOutcome};
use layercast_worker::{JobReporter, ReportError};

/// Collects job results from concurrently running workers.
///
/// Accepts exactly one result per job id.
#[derive(Debug, Default)]
pub struct PipelineJobLedger {
    outcomes: Mutex<HashMap<JobId, JobOutcome>>,
}

impl PipelineJobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The outcome reported for `job_id`, if any.
    pub fn outcome(&self, job_id: &JobId) -> Option<JobOutcome> {
        self.lock().get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, JobOutcome>> {
        match self.outcomes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl JobReporter for PipelineJobLedger {
    fn report(&self, outcome: &JobOutcome) -> Result<(), ReportError> {
        let mut outcomes = self.lock();
        let job_id = outcome.job_id();
        if outcomes.contains_key(job_id) {
            warn!(job_id = %job_id, "duplicate job result rejected");
            return Err(ReportError::DuplicateResult {
                job_id: job_id.to_string(),
            });
        }

        match outcome {
            JobOutcome::Success { .. } => info!(job_id = %job_id, "job succeeded"),
            JobOutcome::Failure { kind, .. } => info!(job_id = %job_id, kind = %kind, "job failed"),
        }
        outcomes.insert(job_id.clone(), outcome.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layercast_protocol::FailureType;

    #[test]
    fn test_one_result_per_job() {
        let ledger = PipelineJobLedger::new();
        let job_id = JobId::new("job-1").unwrap();

        ledger.report(&JobOutcome::success(job_id.clone())).unwrap();
        let err = ledger
            .report(&JobOutcome::failure(job_id.clone(), "late", FailureType::JobFailed))
            .unwrap_err();

        assert!(matches!(err, ReportError::DuplicateResult { .. }));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.outcome(&job_id).unwrap().is_success());
    }
}

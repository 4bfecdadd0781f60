//! Distribute stage orchestration
//!
//! Plans one `distribute-<region>` action per configured region and runs
//! them as independent jobs:
//! - every action receives the same build output and its own user parameters
//! - job ids are assigned here, never by the workers
//! - actions run concurrently, each with its own worker backends
//! - one failing region never stops the others

mod backends;
mod ledger;

use std::collections::HashSet;
use std::thread;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, info_span, warn};

use layercast_protocol::{ArtifactLocation, JobEvent, JobId, JobOutcome, PayloadError, Region, UserParameters};
use layercast_worker::handler::handle_invocation;

use crate::config::{ConfigError, DistributeTargets};
use crate::summary::{ActionStatus, ActionSummary, RunSummary};

pub use backends::{OnDiskBackends, WorkerBackends};
pub use ledger::PipelineJobLedger;

/// Stage name recorded in run summaries
pub const STAGE_NAME: &str = "Distribute";

/// Name of the input artifact every action receives
pub const INPUT_ARTIFACT_NAME: &str = "BuildOutput";

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("action {0} is planned more than once")]
    DuplicateAction(String),

    #[error("job invocation could not be built: {0}")]
    Payload(#[from] PayloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            OrchestratorError::Config(_) => 2,
            OrchestratorError::DuplicateAction(_) => 2,
            OrchestratorError::Payload(_) => 1,
            OrchestratorError::Io(_) => 1,
            OrchestratorError::Serialization(_) => 1,
        }
    }
}

/// Generate a new run_id using ULID
pub fn generate_run_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// Generate a new job id using ULID
pub fn generate_job_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// One planned regional action.
#[derive(Debug, Clone, Serialize)]
pub struct StageAction {
    /// `distribute-<region>`
    pub action_name: String,
    pub region: Region,
    /// The job invocation dispatched to the worker
    pub event: JobEvent,
}

impl StageAction {
    pub fn job_id(&self) -> &str {
        self.event.job_id()
    }
}

/// A planned Distribute stage.
#[derive(Debug, Clone, Serialize)]
pub struct DistributeStage {
    pub run_id: String,
    pub actions: Vec<StageAction>,
}

impl DistributeStage {
    /// Plan one action per target region.
    pub fn plan(targets: &DistributeTargets, artifact: &ArtifactLocation) -> Result<Self, OrchestratorError> {
        if targets.is_public() {
            warn!(
                principal = %targets.principal,
                "wildcard principal without organization id: layer will be shared with every account"
            );
        }

        let mut names = HashSet::new();
        let mut actions = Vec::with_capacity(targets.regions.len());
        for region in &targets.regions {
            let action_name = format!("distribute-{}", region);
            if !names.insert(action_name.clone()) {
                return Err(OrchestratorError::DuplicateAction(action_name));
            }

            let params = UserParameters {
                region: region.to_string(),
                layer_principal: targets.principal.to_string(),
                organization_id: Some(
                    targets
                        .organization_id
                        .as_ref()
                        .map(|o| o.to_string())
                        .unwrap_or_default(),
                ),
            };
            let event = JobEvent::new(generate_job_id(), INPUT_ARTIFACT_NAME, artifact.clone(), &params)?;
            actions.push(StageAction {
                action_name,
                region: region.clone(),
                event,
            });
        }

        Ok(Self {
            run_id: generate_run_id(),
            actions,
        })
    }

    /// Run every action concurrently and summarize the results.
    pub fn run(&self, backends: &dyn WorkerBackends) -> RunSummary {
        let span = info_span!("stage", run_id = %self.run_id, stage = STAGE_NAME);
        let _guard = span.enter();

        let started_at = Utc::now();
        info!(actions = self.actions.len(), "dispatching actions");

        let ledger = PipelineJobLedger::new();
        let dispatched: Vec<Result<JobOutcome, String>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .actions
                .iter()
                .map(|action| {
                    let ledger = &ledger;
                    scope.spawn(move || dispatch(action, backends, ledger))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err("worker thread panicked".to_string()))
                })
                .collect()
        });

        let actions = self
            .actions
            .iter()
            .zip(dispatched)
            .map(|(action, dispatched)| summarize(action, &ledger, dispatched))
            .collect();

        let summary = RunSummary::from_actions(
            self.run_id.clone(),
            STAGE_NAME,
            started_at,
            Utc::now(),
            actions,
        );
        info!(
            status = ?summary.status,
            duration_ms = summary.duration_ms,
            "{}",
            summary.human_summary
        );
        summary
    }
}

/// Send one action's invocation through the same JSON boundary the worker
/// binary reads from stdin.
fn dispatch(
    action: &StageAction,
    backends: &dyn WorkerBackends,
    ledger: &PipelineJobLedger,
) -> Result<JobOutcome, String> {
    let store = backends.artifact_store();
    let regions = backends.region_connector();
    let payload = serde_json::to_vec(&action.event).map_err(|e| e.to_string())?;

    handle_invocation(&mut payload.as_slice(), &*store, &*regions, ledger).map_err(|e| {
        error!(action = %action.action_name, job_id = %action.job_id(), error = %e, "job left unreported");
        e.to_string()
    })
}

fn summarize(
    action: &StageAction,
    ledger: &PipelineJobLedger,
    dispatched: Result<JobOutcome, String>,
) -> ActionSummary {
    let reported = JobId::new(action.job_id())
        .ok()
        .and_then(|job_id| ledger.outcome(&job_id));

    let (status, failure_message, warning) = match (reported, dispatched) {
        (Some(outcome), _) => {
            let (message, warning) = match &outcome {
                JobOutcome::Failure { message, .. } => (Some(message.clone()), None),
                JobOutcome::Success { warning, .. } => {
                    (None, warning.as_ref().map(|w| w.description().to_string()))
                }
            };
            (ActionStatus::from_outcome(&outcome), message, warning)
        }
        (None, Err(e)) => (ActionStatus::Unreported, Some(e), None),
        (None, Ok(_)) => (ActionStatus::Unreported, None, None),
    };

    ActionSummary {
        action_name: action.action_name.clone(),
        region: action.region.to_string(),
        job_id: action.job_id().to_string(),
        status,
        failure_message,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layercast_protocol::{OrganizationId, Principal};
    use layercast_worker::MockState;

    fn targets(regions: &[&str], principal: &str, org: Option<&str>) -> DistributeTargets {
        DistributeTargets {
            regions: regions.iter().map(|r| Region::new(*r).unwrap()).collect(),
            principal: Principal::new(principal).unwrap(),
            organization_id: OrganizationId::optional(org).unwrap(),
        }
    }

    fn artifact() -> ArtifactLocation {
        ArtifactLocation::s3("artifacts", "BuildOutput/layer.zip")
    }

    #[test]
    fn test_plan_one_action_per_region() {
        let stage = DistributeStage::plan(
            &targets(&["us-east-1", "eu-west-1"], "123456789012", None),
            &artifact(),
        )
        .unwrap();

        let names: Vec<_> = stage.actions.iter().map(|a| a.action_name.as_str()).collect();
        assert_eq!(names, vec!["distribute-us-east-1", "distribute-eu-west-1"]);

        let params = stage.actions[1].event.user_parameters().unwrap();
        assert_eq!(params.region, "eu-west-1");
        assert_eq!(params.layer_principal, "123456789012");
        assert_eq!(params.organization_id.as_deref(), Some(""));
        assert_eq!(stage.actions[1].event.input_location().unwrap(), &artifact());
    }

    #[test]
    fn test_plan_assigns_unique_job_ids() {
        let stage = DistributeStage::plan(
            &targets(&["us-east-1", "eu-west-1", "us-west-1"], "*", Some("o-a1b2c3d4e5")),
            &artifact(),
        )
        .unwrap();

        let ids: HashSet<_> = stage.actions.iter().map(|a| a.job_id()).collect();
        assert_eq!(ids.len(), 3);
        assert!(stage.run_id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_plan_rejects_duplicate_regions() {
        let err = DistributeStage::plan(
            &targets(&["us-east-1", "us-east-1"], "123456789012", None),
            &artifact(),
        )
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateAction(ref name) if name == "distribute-us-east-1"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_run_reports_every_action() {
        let state = MockState::new();
        state.put_artifact("artifacts", "BuildOutput/layer.zip", b"PK\x03\x04zip".to_vec());

        let stage = DistributeStage::plan(
            &targets(&["us-east-1", "eu-west-1"], "123456789012", None),
            &artifact(),
        )
        .unwrap();
        let summary = stage.run(&state);

        assert_eq!(summary.run_id, stage.run_id);
        assert_eq!(summary.stage, "Distribute");
        assert_eq!(summary.actions.len(), 2);
        assert!(summary.actions.iter().all(|a| a.status == ActionStatus::Success));
        assert_eq!(state.publish_calls(), 2);
        assert_eq!(state.grant_calls(), 2);
        // Results go to the stage's own ledger, not the mock reporter.
        assert_eq!(state.report_calls(), 0);
    }

    #[test]
    fn test_failed_action_carries_reported_message() {
        let state = MockState::new();
        state.put_artifact("artifacts", "BuildOutput/layer.zip", b"PK\x03\x04zip".to_vec());
        state.fail_grant(layercast_worker::GrantFailure::PermissionDenied);

        let stage = DistributeStage::plan(&targets(&["us-east-1"], "123456789012", None), &artifact()).unwrap();
        let summary = stage.run(&state);

        let action = &summary.actions[0];
        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(
            action.failure_message.as_deref(),
            Some(layercast_protocol::DISTRIBUTION_FAILED_MESSAGE)
        );
        assert_eq!(action.job_id, stage.actions[0].job_id());
    }
}

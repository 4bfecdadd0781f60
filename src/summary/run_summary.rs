//! Run summary (run_summary.json)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use super::status::{ActionStatus, Status};

/// Schema version for run_summary.json
pub const RUN_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for run_summary.json
pub const RUN_SUMMARY_SCHEMA_ID: &str = "layercast/run_summary@1";

/// Result of one regional action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    /// `distribute-<region>`
    pub action_name: String,
    pub region: String,
    pub job_id: String,
    pub status: ActionStatus,

    /// Failure message as reported (generic) or the host-side error when
    /// no result was reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,

    /// Set for `success_with_warning`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Run summary (run_summary.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub schema_id: String,

    /// Run identifier
    pub run_id: String,

    /// Stage name
    pub stage: String,

    /// `success` iff every action succeeded
    pub status: Status,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Wall-clock duration of the stage in milliseconds
    pub duration_ms: u64,

    /// One entry per action, in plan order
    pub actions: Vec<ActionSummary>,

    /// Human-readable summary
    pub human_summary: String,
}

impl RunSummary {
    /// Aggregate action summaries into a run summary
    pub fn from_actions(
        run_id: String,
        stage: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        actions: Vec<ActionSummary>,
    ) -> Self {
        let status = if actions.iter().all(|a| a.status.is_success()) {
            Status::Success
        } else {
            Status::Failed
        };
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        let human_summary = Self::generate_human_summary(status, &actions);

        Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            run_id,
            stage: stage.to_string(),
            status,
            started_at,
            finished_at,
            duration_ms,
            actions,
            human_summary,
        }
    }

    /// Count of actions with the given status
    pub fn count(&self, status: ActionStatus) -> usize {
        self.actions.iter().filter(|a| a.status == status).count()
    }

    fn generate_human_summary(status: Status, actions: &[ActionSummary]) -> String {
        let total = actions.len();
        let succeeded = actions.iter().filter(|a| a.status.is_success()).count();
        let warned = actions
            .iter()
            .filter(|a| a.status == ActionStatus::SuccessWithWarning)
            .count();

        match status {
            Status::Success if warned > 0 => format!(
                "Distribution succeeded: {}/{} regions ({} with warnings)",
                succeeded, total, warned
            ),
            Status::Success => format!("Distribution succeeded: {}/{} regions", succeeded, total),
            Status::Failed => {
                let failed: Vec<&str> = actions
                    .iter()
                    .filter(|a| !a.status.is_success())
                    .map(|a| a.region.as_str())
                    .collect();
                format!(
                    "Distribution failed: {}/{} regions succeeded, failed in {}",
                    succeeded,
                    total,
                    failed.join(", ")
                )
            }
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}

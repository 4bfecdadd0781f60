//! Run summaries for the Distribute stage
//!
//! One `ActionSummary` per regional job, aggregated into a `RunSummary`
//! that can be written as run_summary.json.

mod run_summary;
mod status;

pub use run_summary::{ActionSummary, RunSummary, RUN_SUMMARY_SCHEMA_ID, RUN_SUMMARY_SCHEMA_VERSION};
pub use status::{ActionStatus, Status};

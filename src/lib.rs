//! layercast - regional layer distribution
//!
//! This crate implements the host side of layercast: it fans a built layer
//! archive out to every configured region as independent distribution jobs,
//! one `layercast-worker` job per region, and summarizes the results.

pub mod config;
pub mod stage;
pub mod summary;

pub use config::{ConfigError, EffectiveConfig, Settings};
pub use stage::{DistributeStage, OnDiskBackends, OrchestratorError, PipelineJobLedger, StageAction, WorkerBackends};
pub use summary::{ActionStatus, ActionSummary, RunSummary, Status};

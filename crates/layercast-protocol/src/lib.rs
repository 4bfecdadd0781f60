//! layercast protocol types
//!
//! Defines the JSON contract between the pipeline's Distribute stage and the
//! regional distribution workers: the job invocation payload a worker
//! consumes, the job result it produces, and the deployment-time constants
//! describing the layer being distributed.

pub mod error;
pub mod event;
pub mod ids;
pub mod layer;
pub mod outcome;

pub use error::PayloadError;
pub use event::{
    ActionConfiguration, ActionParameters, ArtifactLocation, InputArtifact, JobData, JobEvent, PipelineJob,
    S3Location, UserParameters,
};
pub use ids::{IdError, JobId, OrganizationId, Principal, Region};
pub use layer::LayerDefinition;
pub use outcome::{FailureDetails, FailureType, JobOutcome, JobResult, OutcomeWarning};

/// Fixed message carried by every distribution failure reported to the pipeline.
///
/// Error detail stays in the worker logs and never reaches the job result.
pub const DISTRIBUTION_FAILED_MESSAGE: &str = "Layer distribution failed. Please check the worker logs";

/// Fixed message for invocations whose user parameters could not be read.
pub const INVALID_CONFIGURATION_MESSAGE: &str = "Distribution job configuration is invalid. Please check the worker logs";

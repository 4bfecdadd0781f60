//! layercast regional distribution worker
//!
//! One worker invocation takes one job from the pipeline's Distribute stage,
//! pulls the layer artifact, publishes it as a new layer version in a single
//! region, grants usage permission on that version, and reports the job
//! result back to the pipeline.
//!
//! This crate can be used in two modes:
//! - **Standalone binary**: `layercast-worker handle` reads a job invocation
//!   on stdin and writes the job result on stdout
//! - **In-process library**: the Distribute stage feeds invocations to
//!   [`handler::handle_invocation`] on its own threads, and tests drive
//!   [`Distributor`] against the mock backends

pub mod config;
pub mod distributor;
pub mod error;
pub mod handler;
pub mod local_store;
pub mod logging;
pub mod mock_state;
pub mod registry;
pub mod reporter;
pub mod request;
pub mod services;

pub use config::WorkerConfig;
pub use distributor::{DistributionError, Distributor};
pub use error::{GrantError, PublishError, ReportError, StoreError};
pub use handler::{HandlerError, JobHandler};
pub use local_store::LocalArtifactStore;
pub use logging::{init_logging, LogFormat};
pub use mock_state::{GrantFailure, MockState, PublishFailure, StoreFailure};
pub use registry::{FsRegionConnector, FsRegionalClient};
pub use reporter::StreamReporter;
pub use request::DistributionRequest;
pub use services::{
    ArtifactStore, GrantReceipt, JobReporter, LayerArtifact, PermissionGrant, PermissionGrantor,
    PublishLayerVersionInput, PublishedLayerVersion, RegionConnector, RegionalClient,
    RegionalPublisher,
};

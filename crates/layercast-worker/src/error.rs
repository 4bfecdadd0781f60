//! Errors raised by the services a worker consumes.

use std::io;
use thiserror::Error;

/// Artifact Store Client errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {location}")]
    NotFound { location: String },

    #[error("I/O error reading artifact {location}: {source}")]
    TransientIo {
        location: String,
        #[source]
        source: io::Error,
    },
}

/// Regional Publisher errors.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish throttled in {region}: rate exceeded")]
    Throttled { region: String },

    #[error("invalid layer content: {reason}")]
    InvalidContent { reason: String },

    #[error("permission denied publishing in {region}: {reason}")]
    PermissionDenied { region: String, reason: String },

    #[error("layer service unavailable in {region}: {source}")]
    Unavailable {
        region: String,
        #[source]
        source: io::Error,
    },
}

/// Permission Grantor errors.
#[derive(Debug, Error)]
pub enum GrantError {
    #[error("invalid principal '{principal}': {reason}")]
    InvalidPrincipal { principal: String, reason: String },

    #[error("permission denied granting in {region}: {reason}")]
    PermissionDenied { region: String, reason: String },

    #[error("layer version {layer_name}:{version} not found")]
    VersionNotFound { layer_name: String, version: u64 },

    #[error("layer service unavailable in {region}: {source}")]
    Unavailable {
        region: String,
        #[source]
        source: io::Error,
    },
}

/// Job Reporter errors.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("job result channel unreachable: {0}")]
    Unreachable(#[from] io::Error),

    #[error("job result could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("a result was already reported for job {job_id}")]
    DuplicateResult { job_id: String },
}

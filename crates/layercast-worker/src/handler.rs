//! Job invocation handler
//!
//! Implements the worker entrypoint:
//!
//!   layercast-worker handle
//!
//! The handler reads one job invocation (JSON) from stdin, runs the
//! distribution against the on-disk backends, and writes one job result
//! line to stdout. Logs go to stderr.

use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::{error, info};

use layercast_protocol::{
    FailureType, JobEvent, JobId, JobOutcome, PayloadError, INVALID_CONFIGURATION_MESSAGE,
};

use crate::config::WorkerConfig;
use crate::distributor::{DistributionError, Distributor};
use crate::local_store::LocalArtifactStore;
use crate::registry::FsRegionConnector;
use crate::reporter::StreamReporter;
use crate::request::DistributionRequest;
use crate::services::{ArtifactStore, JobReporter, RegionConnector};

/// Maximum size of a job invocation (1 MB).
const MAX_INVOCATION_SIZE: u64 = 1024 * 1024;

/// Errors that leave a job without a reported result.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to read job invocation: {0}")]
    Read(#[from] io::Error),

    #[error("job invocation exceeds the 1 MB limit")]
    TooLarge,

    #[error("job invocation cannot be reported: {0}")]
    Unreportable(PayloadError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// Handles one job invocation.
pub struct JobHandler {
    config: WorkerConfig,
}

impl JobHandler {
    /// Create a new handler with the given configuration.
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Handle the invocation on stdin, reporting on stdout.
    pub fn run(&self) -> Result<JobOutcome, HandlerError> {
        self.run_with_io(&mut io::stdin().lock(), io::stdout())
    }

    /// Handle with custom I/O and the configured on-disk backends.
    pub fn run_with_io<R: Read, W: Write + Send>(
        &self,
        reader: &mut R,
        writer: W,
    ) -> Result<JobOutcome, HandlerError> {
        let store = LocalArtifactStore::new(&self.config.artifact_root);
        let regions =
            FsRegionConnector::new(&self.config.registry_root).with_account_id(&self.config.account_id);
        let reporter = StreamReporter::new(writer);
        handle_invocation(reader, &store, &regions, &reporter)
    }
}

/// Read one invocation from `reader` and handle it with the given services.
pub fn handle_invocation<R: Read>(
    reader: &mut R,
    store: &dyn ArtifactStore,
    regions: &dyn RegionConnector,
    reporter: &dyn JobReporter,
) -> Result<JobOutcome, HandlerError> {
    let mut input = String::new();
    reader.take(MAX_INVOCATION_SIZE + 1).read_to_string(&mut input)?;
    if input.len() as u64 > MAX_INVOCATION_SIZE {
        error!("job invocation too large");
        return Err(HandlerError::TooLarge);
    }

    let event = JobEvent::from_json(&input).map_err(|e| {
        error!(error = %e, "unreadable job invocation");
        HandlerError::Unreportable(e)
    })?;
    info!(job_id = %event.job_id(), event = %input.trim(), "received event");

    match DistributionRequest::from_event(&event) {
        Ok(request) => Ok(Distributor::new(store, regions, reporter).handle(&request)?),
        Err(err) => reject(err, reporter),
    }
}

/// Report a configuration failure for an invocation whose parameters are
/// unusable, when its job id is known.
fn reject(err: PayloadError, reporter: &dyn JobReporter) -> Result<JobOutcome, HandlerError> {
    let job_id = match err.job_id().map(JobId::new) {
        Some(Ok(job_id)) => job_id,
        _ => {
            error!(error = %err, "job invocation has no job id; nothing to report");
            return Err(HandlerError::Unreportable(err));
        }
    };

    error!(job_id = %job_id, error = %err, "job configuration rejected");
    let outcome = JobOutcome::failure(
        job_id,
        INVALID_CONFIGURATION_MESSAGE,
        FailureType::ConfigurationError,
    );
    reporter
        .report(&outcome)
        .map_err(DistributionError::ReportingUnreachable)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_state::MockState;
    use layercast_protocol::JobResult;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn invocation(job_id: &str, user_parameters: &str) -> String {
        serde_json::json!({
            "CodePipeline.job": {
                "id": job_id,
                "data": {
                    "actionConfiguration": {"configuration": {"UserParameters": user_parameters}},
                    "inputArtifacts": [{
                        "name": "BuildOutput",
                        "location": {"type": "S3", "s3Location": {"bucketName": "artifacts", "objectKey": "layer.zip"}}
                    }]
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_handle_end_to_end_on_disk() {
        let temp = TempDir::new().unwrap();
        let config = WorkerConfig {
            artifact_root: temp.path().join("artifacts"),
            registry_root: temp.path().join("regions"),
            ..WorkerConfig::default()
        };
        std::fs::create_dir_all(temp.path().join("artifacts/artifacts")).unwrap();
        std::fs::write(temp.path().join("artifacts/artifacts/layer.zip"), b"PK\x03\x04zip").unwrap();

        let input = invocation(
            "job-disk",
            r#"{"region":"us-east-1","layerPrincipal":"123456789012","organizationId":""}"#,
        );
        let mut output = Vec::new();
        let outcome = JobHandler::new(config)
            .run_with_io(&mut Cursor::new(input), &mut output)
            .unwrap();
        assert!(outcome.is_success());

        let result: JobResult = serde_json::from_slice(&output).unwrap();
        assert_eq!(result.job_id.as_str(), "job-disk");
        assert!(result.is_success());
        assert!(temp
            .path()
            .join("regions/us-east-1/layers/sample-layer/1/policy.json")
            .exists());
    }

    #[test]
    fn test_bad_user_parameters_reported_as_configuration_error() {
        let state = MockState::new();
        let input = invocation("job-cfg", "not json");

        let outcome = handle_invocation(&mut Cursor::new(input), &state, &state, &state).unwrap();
        match outcome {
            JobOutcome::Failure { job_id, kind, .. } => {
                assert_eq!(job_id.as_str(), "job-cfg");
                assert_eq!(kind, FailureType::ConfigurationError);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(state.report_calls(), 1);
        assert_eq!(state.store_calls(), 0);
        assert_eq!(state.publish_calls(), 0);
    }

    #[test]
    fn test_unreadable_invocation_not_reported() {
        let state = MockState::new();
        let err = handle_invocation(&mut Cursor::new("{}"), &state, &state, &state).unwrap_err();
        assert!(matches!(err, HandlerError::Unreportable(_)));
        assert_eq!(state.report_calls(), 0);
    }

    #[test]
    fn test_reporting_failure_surfaces() {
        let state = MockState::new();
        state.put_artifact("artifacts", "layer.zip", b"PK\x03\x04zip".to_vec());
        state.fail_report();
        let input = invocation("job-r", r#"{"region":"us-east-1","layerPrincipal":"123456789012"}"#);

        let err = handle_invocation(&mut Cursor::new(input), &state, &state, &state).unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Distribution(DistributionError::ReportingUnreachable(_))
        ));
        assert_eq!(state.publish_calls(), 1);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_one_received_line_per_invocation() {
        let state = MockState::new();
        state.put_artifact("artifacts", "layer.zip", b"PK\x03\x04zip".to_vec());
        let input = invocation("job-log", r#"{"region":"us-east-1","layerPrincipal":"123456789012"}"#);

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let outcome = tracing::subscriber::with_default(subscriber, || {
            handle_invocation(&mut Cursor::new(input), &state, &state, &state).unwrap()
        });
        assert!(outcome.is_success());

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let received: Vec<&str> = text.lines().filter(|line| line.contains("received")).collect();
        assert_eq!(received.len(), 1, "{}", text);
        assert!(received[0].contains("job-log"));
        assert!(text.contains("layer published"));
    }
}

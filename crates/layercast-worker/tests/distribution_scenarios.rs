//! Regional distribution scenarios against the mock services.
//!
//! Covers the ordering guarantees of one worker invocation:
//! - nothing is published when the artifact cannot be retrieved
//! - exactly one grant follows a publish that returned a version
//! - no grant follows a publish that returned no version
//! - the reported job id is always the invocation's job id

use layercast_protocol::{
    ArtifactLocation, FailureType, JobId, JobOutcome, OrganizationId, OutcomeWarning, Principal,
    Region, DISTRIBUTION_FAILED_MESSAGE,
};
use layercast_worker::{
    DistributionRequest, Distributor, GrantFailure, MockState, PublishFailure, StoreFailure,
};

const ZIP: &[u8] = b"PK\x03\x04layer-content";

fn request(job_id: &str, region: &str, principal: &str, org: Option<&str>) -> DistributionRequest {
    DistributionRequest {
        artifact_location: ArtifactLocation::s3("artifacts", "BuildOutput/layer.zip"),
        job_id: JobId::new(job_id).unwrap(),
        region: Region::new(region).unwrap(),
        principal: Principal::new(principal).unwrap(),
        organization_scope: OrganizationId::optional(org).unwrap(),
    }
}

fn state_with_artifact() -> MockState {
    let state = MockState::new();
    state.put_artifact("artifacts", "BuildOutput/layer.zip", ZIP.to_vec());
    state
}

fn assert_generic_failure(outcome: &JobOutcome, job_id: &str) {
    match outcome {
        JobOutcome::Failure {
            job_id: reported,
            message,
            kind,
        } => {
            assert_eq!(reported.as_str(), job_id);
            assert_eq!(message, DISTRIBUTION_FAILED_MESSAGE);
            assert_eq!(*kind, FailureType::JobFailed);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

// === Scenarios ===

#[test]
fn test_account_principal_without_organization() {
    let state = state_with_artifact();
    let outcome = Distributor::new(&state, &state, &state)
        .handle(&request("job-a", "us-east-1", "123456789012", None))
        .unwrap();

    assert_eq!(outcome, JobOutcome::success(JobId::new("job-a").unwrap()));

    let published = state.published("us-east-1");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].version, Some(1));
    assert_eq!(published[0].layer_name, "sample-layer");
    assert_eq!(published[0].content.code_size, ZIP.len() as u64);

    let grants = state.grants("us-east-1");
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].version_number, 1);
    assert_eq!(grants[0].principal.as_str(), "123456789012");
    assert!(grants[0].organization_id.is_none());

    let json = serde_json::to_value(&grants[0]).unwrap();
    assert!(json.get("OrganizationId").is_none());

    assert_eq!(state.reported(), vec![outcome]);
}

#[test]
fn test_wildcard_principal_scoped_to_organization() {
    let state = state_with_artifact();
    let outcome = Distributor::new(&state, &state, &state)
        .handle(&request("job-b", "eu-west-1", "*", Some("o-abc123")))
        .unwrap();

    assert!(outcome.is_success());
    let grants = state.grants("eu-west-1");
    assert_eq!(grants.len(), 1);
    assert!(grants[0].principal.is_wildcard());
    assert_eq!(
        grants[0].organization_id.as_ref().map(|o| o.as_str()),
        Some("o-abc123")
    );
    assert!(state.grants("us-east-1").is_empty());
}

#[test]
fn test_throttled_publish_skips_grant() {
    let state = state_with_artifact();
    state.fail_publish(PublishFailure::Throttled);

    let outcome = Distributor::new(&state, &state, &state)
        .handle(&request("job-c", "ap-southeast-2", "123456789012", None))
        .unwrap();

    assert_generic_failure(&outcome, "job-c");
    assert_eq!(state.publish_calls(), 1);
    assert_eq!(state.grant_calls(), 0);
    assert_eq!(state.report_calls(), 1);
}

#[test]
fn test_denied_grant_leaves_version_published() {
    let state = state_with_artifact();
    state.fail_grant(GrantFailure::PermissionDenied);

    let outcome = Distributor::new(&state, &state, &state)
        .handle(&request("job-d", "us-west-2", "123456789012", None))
        .unwrap();

    assert_generic_failure(&outcome, "job-d");
    assert_eq!(state.published("us-west-2").len(), 1);
    assert_eq!(state.grant_calls(), 1);
    assert!(state.grants("us-west-2").is_empty());
}

// === Ordering ===

#[test]
fn test_missing_artifact_publishes_nothing() {
    let state = MockState::new();
    let outcome = Distributor::new(&state, &state, &state)
        .handle(&request("job-e", "us-east-1", "123456789012", None))
        .unwrap();

    assert_generic_failure(&outcome, "job-e");
    assert_eq!(state.store_calls(), 1);
    assert_eq!(state.publish_calls(), 0);
    assert_eq!(state.grant_calls(), 0);
    assert_eq!(state.report_calls(), 1);
}

#[test]
fn test_transient_store_error_publishes_nothing() {
    let state = state_with_artifact();
    state.fail_store(StoreFailure::TransientIo);

    let outcome = Distributor::new(&state, &state, &state)
        .handle(&request("job-f", "us-east-1", "123456789012", None))
        .unwrap();

    assert!(!outcome.is_success());
    assert_eq!(state.publish_calls(), 0);
}

#[test]
fn test_publish_without_version_skips_grant() {
    let state = state_with_artifact();
    state.omit_version();

    let outcome = Distributor::new(&state, &state, &state)
        .handle(&request("job-g", "us-east-1", "123456789012", None))
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.warning(), Some(OutcomeWarning::PublishedWithoutVersion));
    assert_eq!(state.publish_calls(), 1);
    assert_eq!(state.grant_calls(), 0);

    let result = outcome.to_result();
    assert!(result.failure_details.is_none());
}

#[test]
fn test_repeat_invocations_publish_new_versions() {
    let state = state_with_artifact();
    let distributor = Distributor::new(&state, &state, &state);

    distributor
        .handle(&request("job-h1", "us-east-1", "123456789012", None))
        .unwrap();
    distributor
        .handle(&request("job-h2", "us-east-1", "123456789012", None))
        .unwrap();

    let versions: Vec<_> = state
        .published("us-east-1")
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(versions, vec![Some(1), Some(2)]);

    let granted: Vec<_> = state
        .grants("us-east-1")
        .iter()
        .map(|g| g.version_number)
        .collect();
    assert_eq!(granted, vec![1, 2]);
}

#[test]
fn test_grant_targets_returned_version() {
    let state = state_with_artifact();
    state.set_next_version("eu-central-1", 41);

    Distributor::new(&state, &state, &state)
        .handle(&request("job-i", "eu-central-1", "123456789012", None))
        .unwrap();

    assert_eq!(state.grants("eu-central-1")[0].version_number, 41);
}

#[test]
fn test_regional_failure_is_isolated() {
    let state = state_with_artifact();
    state.fail_publish_in("eu-west-1", PublishFailure::InvalidContent);
    let distributor = Distributor::new(&state, &state, &state);

    let east = distributor.handle(&request("job-j1", "us-east-1", "123456789012", None)).unwrap();
    let west = distributor.handle(&request("job-j2", "eu-west-1", "123456789012", None)).unwrap();

    assert!(east.is_success());
    assert_generic_failure(&west, "job-j2");
    assert_eq!(state.grants("us-east-1").len(), 1);
    assert!(state.published("eu-west-1").is_empty());
}

#[test]
fn test_reported_job_ids_match_invocations() {
    let state = state_with_artifact();
    state.fail_grant_in("us-west-2", GrantFailure::InvalidPrincipal);
    let distributor = Distributor::new(&state, &state, &state);

    for (job_id, region) in [("job-k1", "us-east-1"), ("job-k2", "us-west-2")] {
        distributor
            .handle(&request(job_id, region, "123456789012", None))
            .unwrap();
    }

    let reported: Vec<_> = state
        .reported()
        .iter()
        .map(|o| o.job_id().as_str().to_string())
        .collect();
    assert_eq!(reported, vec!["job-k1", "job-k2"]);
}

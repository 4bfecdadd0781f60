//! Job invocation payload.
//!
//! The Distribute stage hands each worker one of these. The per-region
//! settings travel as a JSON document encoded into the `UserParameters`
//! string, so they are decoded in a second step.

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Top-level invocation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "CodePipeline.job")]
    pub job: PipelineJob,
}

/// One pipeline job as seen by a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineJob {
    /// Correlation token assigned by the pipeline.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub data: JobData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    pub action_configuration: ActionConfiguration,
    #[serde(default)]
    pub input_artifacts: Vec<InputArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfiguration {
    pub configuration: ActionParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// JSON-encoded [`UserParameters`].
    #[serde(default)]
    pub user_parameters: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputArtifact {
    #[serde(default)]
    pub name: String,
    pub location: ArtifactLocation,
}

/// Where a build artifact can be retrieved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    #[serde(rename = "type", default = "default_location_type")]
    pub kind: String,
    #[serde(rename = "s3Location")]
    pub s3_location: S3Location,
}

fn default_location_type() -> String {
    "S3".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Location {
    pub bucket_name: String,
    pub object_key: String,
}

impl ArtifactLocation {
    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: default_location_type(),
            s3_location: S3Location {
                bucket_name: bucket.into(),
                object_key: key.into(),
            },
        }
    }

    pub fn bucket(&self) -> &str {
        &self.s3_location.bucket_name
    }

    pub fn key(&self) -> &str {
        &self.s3_location.object_key
    }
}

impl std::fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket(), self.key())
    }
}

/// Per-region settings carried in `UserParameters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserParameters {
    pub region: String,
    pub layer_principal: String,
    /// Empty, null or missing all mean "no organization scope".
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl JobEvent {
    /// Build the invocation the Distribute stage sends for one region.
    pub fn new(
        job_id: impl Into<String>,
        artifact_name: impl Into<String>,
        location: ArtifactLocation,
        params: &UserParameters,
    ) -> Result<Self, PayloadError> {
        let user_parameters = serde_json::to_string(params)?;
        Ok(Self {
            job: PipelineJob {
                id: job_id.into(),
                account_id: None,
                data: JobData {
                    action_configuration: ActionConfiguration {
                        configuration: ActionParameters {
                            function_name: None,
                            user_parameters,
                        },
                    },
                    input_artifacts: vec![InputArtifact {
                        name: artifact_name.into(),
                        location,
                    }],
                },
            },
        })
    }

    /// Decode an invocation from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }

    /// Location of the first input artifact.
    pub fn input_location(&self) -> Result<&ArtifactLocation, PayloadError> {
        self.job
            .data
            .input_artifacts
            .first()
            .map(|artifact| &artifact.location)
            .ok_or_else(|| PayloadError::MissingInputArtifact {
                job_id: self.job.id.clone(),
            })
    }

    /// Decode the JSON document embedded in `UserParameters`.
    pub fn user_parameters(&self) -> Result<UserParameters, PayloadError> {
        let raw = &self.job.data.action_configuration.configuration.user_parameters;
        serde_json::from_str(raw).map_err(|e| PayloadError::InvalidUserParameters {
            job_id: self.job.id.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "CodePipeline.job": {
            "id": "11111111-abcd-1111-abcd-111111abcdef",
            "accountId": "111111111111",
            "data": {
                "actionConfiguration": {
                    "configuration": {
                        "FunctionName": "LambdaLayerDistributor",
                        "UserParameters": "{\"region\":\"eu-west-1\",\"layerPrincipal\":\"*\",\"organizationId\":\"o-abc123\"}"
                    }
                },
                "inputArtifacts": [{
                    "name": "BuildOutput",
                    "location": {
                        "type": "S3",
                        "s3Location": {"bucketName": "pipeline-artifacts", "objectKey": "build/layer.zip"}
                    }
                }]
            }
        }
    }"#;

    #[test]
    fn test_parse_sample_invocation() {
        let event = JobEvent::from_json(SAMPLE).unwrap();
        assert_eq!(event.job_id(), "11111111-abcd-1111-abcd-111111abcdef");

        let location = event.input_location().unwrap();
        assert_eq!(location.bucket(), "pipeline-artifacts");
        assert_eq!(location.key(), "build/layer.zip");
        assert_eq!(location.to_string(), "s3://pipeline-artifacts/build/layer.zip");

        let params = event.user_parameters().unwrap();
        assert_eq!(params.region, "eu-west-1");
        assert_eq!(params.layer_principal, "*");
        assert_eq!(params.organization_id.as_deref(), Some("o-abc123"));
    }

    #[test]
    fn test_organization_id_may_be_missing() {
        let params: UserParameters =
            serde_json::from_str(r#"{"region":"us-east-1","layerPrincipal":"123456789012"}"#).unwrap();
        assert_eq!(params.organization_id, None);
    }

    #[test]
    fn test_new_encodes_user_parameters_as_string() {
        let params = UserParameters {
            region: "us-west-1".to_string(),
            layer_principal: "123456789012".to_string(),
            organization_id: Some(String::new()),
        };
        let event = JobEvent::new("job-1", "BuildOutput", ArtifactLocation::s3("b", "k"), &params).unwrap();

        let json = serde_json::to_value(&event).unwrap();
        let raw = json["CodePipeline.job"]["data"]["actionConfiguration"]["configuration"]["UserParameters"]
            .as_str()
            .unwrap();
        assert!(raw.contains("\"layerPrincipal\":\"123456789012\""));
        assert_eq!(event.user_parameters().unwrap(), params);
    }

    #[test]
    fn test_missing_input_artifact() {
        let mut event = JobEvent::from_json(SAMPLE).unwrap();
        event.job.data.input_artifacts.clear();
        let err = event.input_location().unwrap_err();
        assert_eq!(err.job_id(), Some("11111111-abcd-1111-abcd-111111abcdef"));
    }

    #[test]
    fn test_invalid_user_parameters() {
        let mut event = JobEvent::from_json(SAMPLE).unwrap();
        event.job.data.action_configuration.configuration.user_parameters = "region=eu-west-1".to_string();
        assert!(matches!(
            event.user_parameters(),
            Err(PayloadError::InvalidUserParameters { .. })
        ));
    }

    #[test]
    fn test_malformed_payload_has_no_job_id() {
        let err = JobEvent::from_json("{\"CodePipeline.job\": 3}").unwrap_err();
        assert_eq!(err.job_id(), None);
    }
}

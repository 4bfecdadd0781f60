//! Deployment-time description of the distributed layer.
//!
//! None of these values come from a job invocation. Changing them means
//! redeploying the workers.

use serde::{Deserialize, Serialize};

/// Name every region publishes the layer under.
pub const LAYER_NAME: &str = "sample-layer";

/// Runtimes the layer declares itself compatible with.
pub const COMPATIBLE_RUNTIMES: &[&str] = &["nodejs12.x", "nodejs14.x"];

/// Description attached to every published version.
pub const LAYER_DESCRIPTION: &str = "Sample layer distributed to multiple region by CodePipeline";

/// License string attached to every published version.
pub const LICENSE_INFO: &str = "MIT";

/// Capability granted to the principal.
pub const PERMISSION_ACTION: &str = "lambda:GetLayerVersion";

/// Statement id reused by every grant, so a later grant replaces an earlier one.
pub const STATEMENT_ID: &str = "layer-policy";

/// Metadata sent with every publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayerDefinition {
    pub layer_name: String,
    pub compatible_runtimes: Vec<String>,
    pub description: String,
    pub license_info: String,
}

impl LayerDefinition {
    /// The layer this deployment distributes.
    pub fn deployed() -> Self {
        Self {
            layer_name: LAYER_NAME.to_string(),
            compatible_runtimes: COMPATIBLE_RUNTIMES.iter().map(|r| r.to_string()).collect(),
            description: LAYER_DESCRIPTION.to_string(),
            license_info: LICENSE_INFO.to_string(),
        }
    }
}

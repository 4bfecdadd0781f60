//! On-disk regional layer registry.
//!
//! Each region is an independent directory tree:
//! `<root>/<region>/layers/<layer_name>/<version>/{content.zip, version.json, policy.json}`
//!
//! - Version numbers start at 1 and are claimed with `create_dir`, so two
//!   concurrent publishes in one region never share a number
//! - Nothing is shared between regions, including version numbering
//! - `policy.json` is keyed by statement id; a second grant with the same
//!   statement id replaces the first

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::Engine;
use chrono::Utc;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use layercast_protocol::{OrganizationId, Principal, Region};

use crate::error::{GrantError, PublishError};
use crate::services::{
    GrantReceipt, LayerVersionContent, PermissionGrant, PermissionGrantor, PublishLayerVersionInput,
    PublishedLayerVersion, RegionConnector, RegionalClient, RegionalPublisher,
};

/// Largest zip accepted by a direct publish (50 MiB).
pub const MAX_ZIP_BYTES: usize = 50 * 1024 * 1024;

/// Account id used in ARNs when none is configured.
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";

const CONTENT_FILE: &str = "content.zip";
const VERSION_FILE: &str = "version.json";
const POLICY_FILE: &str = "policy.json";

/// Base64 SHA-256 of layer content.
pub fn code_sha256(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(bytes))
}

fn account_principal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]{12}|arn:aws:iam::[0-9]{12}:root)$").unwrap())
}

fn strict_organization_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^o-[a-z0-9]{10,32}$").unwrap())
}

/// Check a principal and organization scope against the rules the registry
/// applies when granting.
///
/// The principal must be `*`, a 12-digit account id, or an account root ARN.
/// An organization id must be `o-` followed by 10 to 32 lowercase
/// alphanumerics.
pub fn validate_grant_target(
    principal: &Principal,
    organization_id: Option<&OrganizationId>,
) -> Result<(), GrantError> {
    if !principal.is_wildcard() && !account_principal_pattern().is_match(principal.as_str()) {
        return Err(GrantError::InvalidPrincipal {
            principal: principal.to_string(),
            reason: "expected an account id, an account root ARN, or *".to_string(),
        });
    }
    if let Some(org) = organization_id {
        if !strict_organization_pattern().is_match(org.as_str()) {
            return Err(GrantError::InvalidPrincipal {
                principal: principal.to_string(),
                reason: format!("organization id '{}' is malformed", org),
            });
        }
    }
    Ok(())
}

/// Connector handing out clients over one registry root.
#[derive(Debug, Clone)]
pub struct FsRegionConnector {
    root: PathBuf,
    account_id: String,
}

impl FsRegionConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
        }
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// A client bound to `region`.
    pub fn client(&self, region: &Region) -> FsRegionalClient {
        FsRegionalClient {
            region: region.clone(),
            region_root: self.root.join(region.as_str()),
            account_id: self.account_id.clone(),
        }
    }
}

impl RegionConnector for FsRegionConnector {
    fn connect(&self, region: &Region) -> Box<dyn RegionalClient> {
        Box::new(self.client(region))
    }
}

/// A policy statement as stored in `policy.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub sid: String,
    pub effect: String,
    pub principal: String,
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

/// Regional client over the on-disk registry.
#[derive(Debug, Clone)]
pub struct FsRegionalClient {
    region: Region,
    region_root: PathBuf,
    account_id: String,
}

impl FsRegionalClient {
    fn layer_dir(&self, layer_name: &str) -> PathBuf {
        self.region_root.join("layers").join(layer_name)
    }

    fn version_dir(&self, layer_name: &str, version: u64) -> PathBuf {
        self.layer_dir(layer_name).join(version.to_string())
    }

    fn layer_arn(&self, layer_name: &str) -> String {
        format!("arn:aws:lambda:{}:{}:layer:{}", self.region, self.account_id, layer_name)
    }

    /// Published version numbers of `layer_name`, ascending.
    pub fn versions(&self, layer_name: &str) -> io::Result<Vec<u64>> {
        let dir = self.layer_dir(layer_name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut versions: Vec<u64> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(VERSION_FILE).exists())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Metadata of one published version.
    pub fn get_version(&self, layer_name: &str, version: u64) -> io::Result<PublishedLayerVersion> {
        let bytes = fs::read(self.version_dir(layer_name, version).join(VERSION_FILE))?;
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Policy statements of one version, keyed by statement id.
    pub fn policy(&self, layer_name: &str, version: u64) -> io::Result<BTreeMap<String, PolicyStatement>> {
        let path = self.version_dir(layer_name, version).join(POLICY_FILE);
        match fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Claim the next free version number by creating its directory.
    fn claim_version(&self, layer_dir: &Path) -> io::Result<(u64, PathBuf)> {
        let mut next = fs::read_dir(layer_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        loop {
            let dir = layer_dir.join(next.to_string());
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((next, dir)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => next += 1,
                Err(e) => return Err(e),
            }
        }
    }

    fn publish_error(&self, e: io::Error) -> PublishError {
        if e.kind() == io::ErrorKind::PermissionDenied {
            PublishError::PermissionDenied {
                region: self.region.to_string(),
                reason: e.to_string(),
            }
        } else {
            PublishError::Unavailable {
                region: self.region.to_string(),
                source: e,
            }
        }
    }

    fn grant_error(&self, e: io::Error) -> GrantError {
        if e.kind() == io::ErrorKind::PermissionDenied {
            GrantError::PermissionDenied {
                region: self.region.to_string(),
                reason: e.to_string(),
            }
        } else {
            GrantError::Unavailable {
                region: self.region.to_string(),
                source: e,
            }
        }
    }
}

/// Write via a temp file in the same directory, then rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let temp_path = path.with_file_name(format!(".{}.tmp.{}", file_name, std::process::id()));

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn validate_zip(bytes: &[u8]) -> Result<(), PublishError> {
    if bytes.is_empty() {
        return Err(PublishError::InvalidContent {
            reason: "uploaded file is empty".to_string(),
        });
    }
    if bytes.len() > MAX_ZIP_BYTES {
        return Err(PublishError::InvalidContent {
            reason: format!("zip of {} bytes exceeds the {} byte limit", bytes.len(), MAX_ZIP_BYTES),
        });
    }
    // Local file header, or end-of-central-directory for an empty archive.
    if !(bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06")) {
        return Err(PublishError::InvalidContent {
            reason: "uploaded file must be a zip archive".to_string(),
        });
    }
    Ok(())
}

impl RegionalPublisher for FsRegionalClient {
    fn publish_layer_version(
        &self,
        input: &PublishLayerVersionInput<'_>,
    ) -> Result<PublishedLayerVersion, PublishError> {
        validate_zip(input.zip_file)?;

        let definition = input.definition;
        let layer_dir = self.layer_dir(&definition.layer_name);
        fs::create_dir_all(&layer_dir).map_err(|e| self.publish_error(e))?;

        let (version, version_dir) = self.claim_version(&layer_dir).map_err(|e| self.publish_error(e))?;

        let layer_arn = self.layer_arn(&definition.layer_name);
        let published = PublishedLayerVersion {
            layer_name: definition.layer_name.clone(),
            layer_version_arn: format!("{}:{}", layer_arn, version),
            layer_arn,
            version: Some(version),
            description: definition.description.clone(),
            created_date: Utc::now(),
            compatible_runtimes: definition.compatible_runtimes.clone(),
            license_info: definition.license_info.clone(),
            content: LayerVersionContent {
                code_sha256: code_sha256(input.zip_file),
                code_size: input.zip_file.len() as u64,
            },
        };

        let metadata = serde_json::to_vec_pretty(&published)
            .map_err(|e| self.publish_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        // version.json last: a version without it is not listed
        write_atomic(&version_dir.join(CONTENT_FILE), input.zip_file).map_err(|e| self.publish_error(e))?;
        write_atomic(&version_dir.join(VERSION_FILE), &metadata).map_err(|e| self.publish_error(e))?;

        Ok(published)
    }
}

impl PermissionGrantor for FsRegionalClient {
    fn add_layer_version_permission(&self, grant: &PermissionGrant) -> Result<GrantReceipt, GrantError> {
        validate_grant_target(&grant.principal, grant.organization_id.as_ref())?;
        let principal = grant.principal.as_str();

        let version_dir = self.version_dir(&grant.layer_name, grant.version_number);
        if !version_dir.join(VERSION_FILE).exists() {
            return Err(GrantError::VersionNotFound {
                layer_name: grant.layer_name.clone(),
                version: grant.version_number,
            });
        }

        let statement = PolicyStatement {
            sid: grant.statement_id.clone(),
            effect: "Allow".to_string(),
            principal: principal.to_string(),
            action: grant.action.clone(),
            resource: format!("{}:{}", self.layer_arn(&grant.layer_name), grant.version_number),
            condition: grant.organization_id.as_ref().map(|org| {
                serde_json::json!({ "StringEquals": { "aws:PrincipalOrgID": org.as_str() } })
            }),
        };

        let mut policy = self
            .policy(&grant.layer_name, grant.version_number)
            .map_err(|e| self.grant_error(e))?;
        policy.insert(statement.sid.clone(), statement.clone());

        let policy_bytes = serde_json::to_vec_pretty(&policy)
            .map_err(|e| self.grant_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        write_atomic(&version_dir.join(POLICY_FILE), &policy_bytes).map_err(|e| self.grant_error(e))?;

        let statement_json = serde_json::to_string(&statement)
            .map_err(|e| self.grant_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        Ok(GrantReceipt {
            statement: statement_json,
            revision_id: hex::encode(Sha256::digest(&policy_bytes)),
        })
    }
}

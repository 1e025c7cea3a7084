//! Retrieval requests: which vendor, which project, which artifact.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::UnsupportedProvider;

/// Default branch used by branch/job addressed lookups.
pub const DEFAULT_BRANCH: &str = "master";

/// Supported CI vendors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// GitLab CI, artifacts addressed by branch + job name
    GitLab,

    /// GitHub Actions, artifacts addressed by name
    GitHub,
}

impl ProviderKind {
    /// Configuration value for this vendor (`repo_type`).
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::GitLab => "gitlab",
            ProviderKind::GitHub => "github",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::GitLab => write!(f, "GitLab"),
            ProviderKind::GitHub => write!(f, "GitHub"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = UnsupportedProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gitlab" => Ok(ProviderKind::GitLab),
            "github" => Ok(ProviderKind::GitHub),
            _ => Err(UnsupportedProvider(s.to_string())),
        }
    }
}

/// Authentication token for a CI vendor.
///
/// `Debug` is redacted so the token never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    /// The raw token, for request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Vendor-specific artifact locator.
///
/// Exactly one field set exists per vendor, so a request can never carry
/// a job name for GitHub or an artifact name for GitLab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// GitLab: latest successful artifacts of `job_name` on `branch`
    BranchJob { branch: String, job_name: String },

    /// GitHub: workflow artifact named `artifact_name`
    NamedArtifact { artifact_name: String },
}

impl Locator {
    /// The vendor this locator addresses.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Locator::BranchJob { .. } => ProviderKind::GitLab,
            Locator::NamedArtifact { .. } => ProviderKind::GitHub,
        }
    }
}

/// Everything needed to connect to a vendor and fetch one artifact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    /// Vendor endpoint, e.g. `https://gitlab.example.com`
    pub endpoint: String,

    /// Vendor token
    pub credential: Credential,

    /// Project path/id (GitLab) or `owner/name` (GitHub)
    pub project: String,

    /// Path of the target file inside the artifact archive
    pub artifact_path: String,

    /// Vendor-specific locator
    pub locator: Locator,
}

impl RetrievalRequest {
    /// The vendor this request targets.
    pub fn kind(&self) -> ProviderKind {
        self.locator.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse_case_insensitive() {
        assert_eq!("gitlab".parse::<ProviderKind>().unwrap(), ProviderKind::GitLab);
        assert_eq!("GitHub".parse::<ProviderKind>().unwrap(), ProviderKind::GitHub);
        assert_eq!(" GITLAB ".parse::<ProviderKind>().unwrap(), ProviderKind::GitLab);
    }

    #[test]
    fn test_provider_kind_rejects_unknown() {
        let err = "bitbucket".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err, UnsupportedProvider("bitbucket".to_string()));
        assert!("".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("glpat-secret");
        assert_eq!(format!("{:?}", cred), "Credential(***)");
        assert_eq!(cred.expose(), "glpat-secret");
    }

    #[test]
    fn test_locator_kind_matches_vendor() {
        let gl = Locator::BranchJob {
            branch: DEFAULT_BRANCH.to_string(),
            job_name: "train".to_string(),
        };
        let gh = Locator::NamedArtifact {
            artifact_name: "model".to_string(),
        };
        assert_eq!(gl.kind(), ProviderKind::GitLab);
        assert_eq!(gh.kind(), ProviderKind::GitHub);
    }
}

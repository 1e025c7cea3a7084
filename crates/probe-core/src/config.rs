//! Probe configuration (stage 1).
//!
//! The host harness hands over a loosely typed option map; it is validated
//! once here into a `RetrievalRequest` whose locator already matches the
//! vendor, so later stages never check optional fields again.

use probe_artifacts::{Credential, Locator, ProviderKind, RetrievalRequest, DEFAULT_BRANCH};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Component, Path};

use crate::error::ConfigError;

/// Options recognised in the harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// CI endpoint/domain
    #[serde(deserialize_with = "string_like")]
    pub target: Option<String>,

    /// `gitlab` or `github` (case-insensitive)
    #[serde(deserialize_with = "string_like")]
    pub repo_type: Option<String>,

    /// Project path or numeric id (GitLab), `owner/name` (GitHub)
    #[serde(deserialize_with = "string_like")]
    pub project: Option<String>,

    /// Branch for GitLab lookups (default `master`)
    #[serde(deserialize_with = "string_like")]
    pub branch: Option<String>,

    /// Path of the model inside the artifact archive
    #[serde(deserialize_with = "string_like")]
    pub artifact_path: Option<String>,

    /// GitLab job name
    #[serde(deserialize_with = "string_like")]
    pub job_name: Option<String>,

    /// GitHub artifact name
    #[serde(deserialize_with = "string_like")]
    pub artifact_name: Option<String>,
}

impl RawConfig {
    /// Read the options from harness input JSON.
    ///
    /// Accepts either the harness envelope `{"config": {...}}` or the bare
    /// option map.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let options = match value.get("config") {
            Some(inner) if inner.is_object() => inner,
            _ => value,
        };
        if !options.is_object() {
            return Err(ConfigError::Malformed(
                "configuration must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(options.clone()).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Validate into a retrieval request.
    ///
    /// No network access happens here; every rejection is a `ConfigError`.
    pub fn validate(&self, credential: Option<Credential>) -> Result<RetrievalRequest, ConfigError> {
        let target = required(&self.target, "target")?;
        let repo_type = required(&self.repo_type, "repo_type")?;
        let project = required(&self.project, "project")?;
        let artifact_path = required(&self.artifact_path, "artifact_path")?;

        let kind: ProviderKind = repo_type.parse()?;
        validate_artifact_path(artifact_path)?;

        let locator = match kind {
            ProviderKind::GitLab => Locator::BranchJob {
                branch: optional(&self.branch)
                    .unwrap_or(DEFAULT_BRANCH)
                    .to_string(),
                job_name: required(&self.job_name, "job_name")?.to_string(),
            },
            ProviderKind::GitHub => {
                validate_repository(project)?;
                Locator::NamedArtifact {
                    artifact_name: required(&self.artifact_name, "artifact_name")?.to_string(),
                }
            }
        };

        let credential = credential
            .filter(|c| !c.is_empty())
            .ok_or(ConfigError::MissingCredential)?;

        Ok(RetrievalRequest {
            endpoint: target.to_string(),
            credential,
            project: project.to_string(),
            artifact_path: artifact_path.to_string(),
            locator,
        })
    }
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ConfigError> {
    optional(value).ok_or(ConfigError::MissingField(field))
}

fn validate_artifact_path(path: &str) -> Result<(), ConfigError> {
    let invalid = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if invalid {
        return Err(ConfigError::InvalidField {
            field: "artifact_path",
            reason: format!("'{path}' must be a relative path inside the artifact archive"),
        });
    }
    Ok(())
}

fn validate_repository(project: &str) -> Result<(), ConfigError> {
    match project.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(ConfigError::InvalidField {
            field: "project",
            reason: format!("'{project}' is not a GitHub repository of the form owner/name"),
        }),
    }
}

/// Accept strings, numbers and booleans; harnesses often send project ids as numbers.
fn string_like<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a string, got {other}"
            )))
        }
    })
}

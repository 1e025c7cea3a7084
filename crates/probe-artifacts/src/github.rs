//! GitHub artifact provider
//!
//! Artifacts are addressed by workflow artifact name. GitHub bundles do not
//! keep the build tree layout that GitLab bundles do, so the requested path
//! is reduced to its file name and opened from the extraction root.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::archive;
use crate::error::RetrievalError;
use crate::handle::ArtifactHandle;
use crate::http;
use crate::provider::{locator_mismatch, ArtifactProvider};
use crate::request::{Credential, Locator, ProviderKind};

const PROVIDER: ProviderKind = ProviderKind::GitHub;

/// Public GitHub API root.
pub const PUBLIC_API: &str = "https://api.github.com";

const MEDIA_TYPE: &str = "application/vnd.github+json";

/// Listing returned by `repos/:owner/:repo/actions/artifacts`.
#[derive(Debug, Deserialize)]
pub struct ArtifactList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub artifacts: Vec<WorkflowArtifact>,
}

/// One workflow artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowArtifact {
    pub id: u64,
    pub name: String,
    pub archive_download_url: String,
    #[serde(default)]
    pub expired: bool,
}

/// Named-artifact provider backed by the GitHub REST API.
pub struct GitHubProvider {
    client: reqwest::Client,
    api_base: Url,
    credential: Credential,
    owner: String,
    repo: String,
}

impl GitHubProvider {
    /// Authenticate with `credential` and resolve `repository` (`owner/name`).
    pub async fn connect(
        endpoint: &str,
        credential: &Credential,
        repository: &str,
    ) -> Result<Self, RetrievalError> {
        let api_base = Self::api_base(endpoint)?;
        let (owner, repo) = split_repository(repository)?;
        let client = http::build_client(PROVIDER)?;

        let repo_url = http::api_url(PROVIDER, &api_base, &["repos", owner, repo])?;
        debug!(url = %repo_url, "Resolving GitHub repository");
        let response = client
            .get(repo_url)
            .header(AUTHORIZATION, format!("Bearer {}", credential.expose()))
            .header(ACCEPT, MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        http::check_status(PROVIDER, response).await?;

        info!(repository = %repository, "Resolved GitHub repository");

        Ok(Self {
            client,
            api_base,
            credential: credential.clone(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// REST root for github.com or a GitHub Enterprise Server instance.
    pub fn api_base(endpoint: &str) -> Result<Url, RetrievalError> {
        let trimmed = endpoint.trim().trim_end_matches('/');
        if trimmed == "https://github.com" {
            return http::api_base(PROVIDER, PUBLIC_API, &[] as &[&str]);
        }
        http::api_base(PROVIDER, trimmed, &["api", "v3"])
    }

    /// Listing URL for artifacts named `artifact_name`.
    pub fn artifacts_url(
        api_base: &Url,
        owner: &str,
        repo: &str,
        artifact_name: &str,
    ) -> Result<Url, RetrievalError> {
        let mut url = http::api_url(
            PROVIDER,
            api_base,
            &["repos", owner, repo, "actions", "artifacts"],
        )?;
        url.query_pairs_mut().append_pair("name", artifact_name);
        Ok(url)
    }

    async fn list_artifacts(&self, artifact_name: &str) -> Result<ArtifactList, RetrievalError> {
        let url = Self::artifacts_url(&self.api_base, &self.owner, &self.repo, artifact_name)?;
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.credential.expose()))
            .header(ACCEPT, MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        let response = http::check_status(PROVIDER, response).await?;
        response
            .json()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))
    }

    async fn download(&self, artifact: &WorkflowArtifact) -> Result<Vec<u8>, RetrievalError> {
        let response = self
            .client
            .get(&artifact.archive_download_url)
            .header(AUTHORIZATION, format!("token {}", self.credential.expose()))
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        let response = http::check_status(PROVIDER, response).await?;
        http::read_bytes(PROVIDER, response).await
    }
}

#[async_trait]
impl ArtifactProvider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    async fn fetch(
        &self,
        locator: &Locator,
        artifact_path: &str,
        scratch: &Path,
    ) -> Result<ArtifactHandle, RetrievalError> {
        let Locator::NamedArtifact { artifact_name } = locator else {
            return Err(locator_mismatch(PROVIDER, locator));
        };

        let listing = self.list_artifacts(artifact_name).await?;
        let artifact = first_match(&listing, artifact_name)?;
        if artifact.expired {
            warn!(artifact_id = artifact.id, "Artifact is marked expired, download may fail");
        }

        info!(
            repository = %format!("{}/{}", self.owner, self.repo),
            artifact = %artifact.name,
            artifact_id = artifact.id,
            "Downloading GitHub artifact"
        );
        let bundle = self.download(artifact).await?;
        debug!(bytes = bundle.len(), "Downloaded artifact bundle");

        let root = archive::store_and_extract(&bundle, scratch)?;
        archive::open_extracted(&root, archive::basename(artifact_path))
    }
}

/// Split `owner/name` into its two parts.
pub fn split_repository(repository: &str) -> Result<(&str, &str), RetrievalError> {
    match repository.trim().split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => Err(RetrievalError::Lookup {
            provider: PROVIDER,
            status: 404,
            message: format!("repository '{repository}' is not of the form owner/name"),
        }),
    }
}

/// First artifact of a listing, or `NotFound` when there is none.
pub fn first_match<'a>(
    listing: &'a ArtifactList,
    artifact_name: &str,
) -> Result<&'a WorkflowArtifact, RetrievalError> {
    listing.artifacts.first().ok_or_else(|| {
        RetrievalError::NotFound(format!("Artifact '{artifact_name}' doesn't exist"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_base() {
        let url = GitHubProvider::api_base("https://github.com").unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/");
        let url = GitHubProvider::api_base("https://github.com/").unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/");
    }

    #[test]
    fn test_enterprise_api_base() {
        let url = GitHubProvider::api_base("https://ghe.example.com").unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3");
    }

    #[test]
    fn test_artifacts_url() {
        let base = GitHubProvider::api_base("https://github.com").unwrap();
        let url = GitHubProvider::artifacts_url(&base, "ml", "classifier", "model").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/ml/classifier/actions/artifacts?name=model"
        );
    }

    #[test]
    fn test_split_repository() {
        assert_eq!(split_repository("ml/classifier").unwrap(), ("ml", "classifier"));
        assert!(split_repository("classifier").is_err());
        assert!(split_repository("/classifier").is_err());
        assert!(split_repository("a/b/c").is_err());
    }

    #[test]
    fn test_listing_parses_and_takes_first() {
        let listing: ArtifactList = serde_json::from_str(
            r#"{
                "total_count": 2,
                "artifacts": [
                    {"id": 11, "name": "model", "archive_download_url": "https://api.github.com/a/11/zip", "expired": false},
                    {"id": 10, "name": "model", "archive_download_url": "https://api.github.com/a/10/zip", "expired": true}
                ]
            }"#,
        )
        .unwrap();

        let first = first_match(&listing, "model").unwrap();
        assert_eq!(first.id, 11);
        assert!(!first.expired);
    }

    #[test]
    fn test_empty_listing_is_not_found() {
        let listing: ArtifactList =
            serde_json::from_str(r#"{"total_count": 0, "artifacts": []}"#).unwrap();
        let err = first_match(&listing, "model").unwrap_err();
        match err {
            RetrievalError::NotFound(msg) => assert!(msg.contains("doesn't exist")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! GitLab artifact provider
//!
//! Artifacts are addressed by branch + job name and downloaded from
//! `projects/:id/jobs/artifacts/:ref/download?job=:name`. The requested
//! path is resolved relative to the extracted bundle root, unchanged.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::archive;
use crate::error::RetrievalError;
use crate::handle::ArtifactHandle;
use crate::http;
use crate::provider::{locator_mismatch, ArtifactProvider};
use crate::request::{Credential, Locator, ProviderKind};

const PROVIDER: ProviderKind = ProviderKind::GitLab;

/// Header GitLab expects personal/project access tokens in.
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    id: u64,
    #[serde(default)]
    path_with_namespace: String,
}

/// Branch/job addressed provider backed by the GitLab REST API (v4).
pub struct GitLabProvider {
    client: reqwest::Client,
    api_base: Url,
    credential: Credential,
    project_id: u64,
    project_path: String,
}

impl GitLabProvider {
    /// Authenticate against `endpoint` and resolve `project`.
    ///
    /// Fails fast with `AuthFailure` when the token or endpoint is rejected.
    pub async fn connect(
        endpoint: &str,
        credential: &Credential,
        project: &str,
    ) -> Result<Self, RetrievalError> {
        let api_base = Self::api_base(endpoint)?;
        let client = http::build_client(PROVIDER)?;

        let user_url = http::api_url(PROVIDER, &api_base, &["user"])?;
        debug!(url = %user_url, "Authenticating with GitLab");
        let response = client
            .get(user_url)
            .header(TOKEN_HEADER, credential.expose())
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        http::check_status(PROVIDER, response).await?;

        let project_url = http::api_url(PROVIDER, &api_base, &["projects", project])?;
        let response = client
            .get(project_url)
            .header(TOKEN_HEADER, credential.expose())
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        let response = http::check_status(PROVIDER, response).await?;
        let info: ProjectInfo = response
            .json()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;

        info!(project_id = info.id, project = %info.path_with_namespace, "Resolved GitLab project");

        Ok(Self {
            client,
            api_base,
            credential: credential.clone(),
            project_id: info.id,
            project_path: info.path_with_namespace,
        })
    }

    /// REST root for a GitLab instance.
    pub fn api_base(endpoint: &str) -> Result<Url, RetrievalError> {
        http::api_base(PROVIDER, endpoint, &["api", "v4"])
    }

    /// Download URL for the latest artifacts of `job_name` on `branch`.
    pub fn artifacts_url(
        api_base: &Url,
        project_id: u64,
        branch: &str,
        job_name: &str,
    ) -> Result<Url, RetrievalError> {
        let project_id = project_id.to_string();
        let mut url = http::api_url(
            PROVIDER,
            api_base,
            &[
                "projects",
                project_id.as_str(),
                "jobs",
                "artifacts",
                branch,
                "download",
            ],
        )?;
        url.query_pairs_mut().append_pair("job", job_name);
        Ok(url)
    }
}

#[async_trait]
impl ArtifactProvider for GitLabProvider {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    async fn fetch(
        &self,
        locator: &Locator,
        artifact_path: &str,
        scratch: &Path,
    ) -> Result<ArtifactHandle, RetrievalError> {
        let Locator::BranchJob { branch, job_name } = locator else {
            return Err(locator_mismatch(PROVIDER, locator));
        };

        let url = Self::artifacts_url(&self.api_base, self.project_id, branch, job_name)?;
        info!(project = %self.project_path, branch = %branch, job = %job_name, "Downloading GitLab job artifacts");

        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, self.credential.expose())
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        let response = http::check_status(PROVIDER, response).await?;
        let bundle = http::read_bytes(PROVIDER, response).await?;
        debug!(bytes = bundle.len(), "Downloaded artifact bundle");

        let root = archive::store_and_extract(&bundle, scratch)?;
        archive::open_extracted(&root, artifact_path)
    }
}

//! Artifact provider contract and the provider selector.
//!
//! - `ArtifactProvider`: one capability, `fetch`, implemented per vendor
//! - `ProviderFactory`: constructs (and authenticates) a vendor provider
//! - `ArtifactSource`: picks the provider matching a request and forwards `fetch`

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::error::RetrievalError;
use crate::github::GitHubProvider;
use crate::gitlab::GitLabProvider;
use crate::handle::ArtifactHandle;
use crate::request::{Locator, ProviderKind, RetrievalRequest};

/// A CI vendor that can hand out one extracted artifact file.
///
/// Implementations write the downloaded bundle and its extraction tree
/// under `scratch`, which must be unique to the calling run.
#[async_trait]
pub trait ArtifactProvider: Send + Sync {
    /// Vendor served by this provider.
    fn kind(&self) -> ProviderKind;

    /// Download, extract and open the file at `artifact_path`.
    async fn fetch(
        &self,
        locator: &Locator,
        artifact_path: &str,
        scratch: &Path,
    ) -> Result<ArtifactHandle, RetrievalError>;
}

/// Constructs authenticated providers.
///
/// Construction is where credentials are checked, so both methods may fail
/// with `AuthFailure` before any artifact is requested.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Branch/job addressed provider (GitLab).
    async fn connect_gitlab(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Box<dyn ArtifactProvider>, RetrievalError>;

    /// Named-artifact provider (GitHub).
    async fn connect_github(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Box<dyn ArtifactProvider>, RetrievalError>;
}

/// Factory for the real vendor clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpProviderFactory;

#[async_trait]
impl ProviderFactory for HttpProviderFactory {
    async fn connect_gitlab(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Box<dyn ArtifactProvider>, RetrievalError> {
        let provider =
            GitLabProvider::connect(&request.endpoint, &request.credential, &request.project)
                .await?;
        Ok(Box::new(provider))
    }

    async fn connect_github(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Box<dyn ArtifactProvider>, RetrievalError> {
        let provider =
            GitHubProvider::connect(&request.endpoint, &request.credential, &request.project)
                .await?;
        Ok(Box::new(provider))
    }
}

/// Provider-agnostic entry point for the rest of the probe.
///
/// Holds exactly one provider, chosen from the request's locator. Carries
/// no retry or caching logic.
pub struct ArtifactSource {
    provider: Box<dyn ArtifactProvider>,
}

impl ArtifactSource {
    /// Construct the provider matching `request`.
    pub async fn create(
        factory: &dyn ProviderFactory,
        request: &RetrievalRequest,
    ) -> Result<Self, RetrievalError> {
        let kind = request.kind();
        info!(provider = %kind, endpoint = %request.endpoint, project = %request.project, "Connecting artifact provider");

        let provider = match kind {
            ProviderKind::GitLab => factory.connect_gitlab(request).await?,
            ProviderKind::GitHub => factory.connect_github(request).await?,
        };
        Ok(Self { provider })
    }

    /// Fetch the artifact file named by `request`.
    pub async fn fetch_request(
        &self,
        request: &RetrievalRequest,
        scratch: &Path,
    ) -> Result<ArtifactHandle, RetrievalError> {
        self.fetch(&request.locator, &request.artifact_path, scratch)
            .await
    }
}

#[async_trait]
impl ArtifactProvider for ArtifactSource {
    fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    async fn fetch(
        &self,
        locator: &Locator,
        artifact_path: &str,
        scratch: &Path,
    ) -> Result<ArtifactHandle, RetrievalError> {
        self.provider.fetch(locator, artifact_path, scratch).await
    }
}

/// Error for a locator handed to the wrong vendor.
pub(crate) fn locator_mismatch(provider: ProviderKind, locator: &Locator) -> RetrievalError {
    RetrievalError::NotFound(format!(
        "{} artifacts cannot be addressed by a {} locator",
        provider,
        locator.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::zip_bundle;
    use crate::fakes::{RecordingFactory, StaticProvider};
    use crate::request::{Credential, DEFAULT_BRANCH};
    use tempfile::tempdir;

    fn gitlab_request() -> RetrievalRequest {
        RetrievalRequest {
            endpoint: "https://gitlab.example.com".to_string(),
            credential: Credential::new("token"),
            project: "ml/classifier".to_string(),
            artifact_path: "out/model.onnx".to_string(),
            locator: Locator::BranchJob {
                branch: DEFAULT_BRANCH.to_string(),
                job_name: "train".to_string(),
            },
        }
    }

    fn github_request() -> RetrievalRequest {
        RetrievalRequest {
            endpoint: "https://github.com".to_string(),
            credential: Credential::new("token"),
            project: "ml/classifier".to_string(),
            artifact_path: "out/model.onnx".to_string(),
            locator: Locator::NamedArtifact {
                artifact_name: "model".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_gitlab_request_selects_branch_job_provider() {
        let bundle = zip_bundle(&[("out/model.onnx", b"m")]);
        let factory = RecordingFactory::serving(bundle);

        let source = ArtifactSource::create(&factory, &gitlab_request())
            .await
            .unwrap();

        assert_eq!(source.kind(), ProviderKind::GitLab);
        assert_eq!(factory.connections(), vec![ProviderKind::GitLab]);
    }

    #[tokio::test]
    async fn test_github_request_selects_named_artifact_provider() {
        let bundle = zip_bundle(&[("model.onnx", b"m")]);
        let factory = RecordingFactory::serving(bundle);

        let source = ArtifactSource::create(&factory, &github_request())
            .await
            .unwrap();

        assert_eq!(source.kind(), ProviderKind::GitHub);
        assert_eq!(factory.connections(), vec![ProviderKind::GitHub]);
    }

    #[tokio::test]
    async fn test_source_forwards_fetch() {
        let scratch = tempdir().unwrap();
        let bundle = zip_bundle(&[("out/model.onnx", b"weights")]);
        let factory = RecordingFactory::serving(bundle);
        let request = gitlab_request();

        let source = ArtifactSource::create(&factory, &request).await.unwrap();
        let handle = source
            .fetch_request(&request, scratch.path())
            .await
            .unwrap();

        assert_eq!(handle.into_bytes().unwrap(), b"weights");
    }

    #[tokio::test]
    async fn test_wrong_locator_is_rejected() {
        let scratch = tempdir().unwrap();
        let provider = StaticProvider::new(ProviderKind::GitLab, zip_bundle(&[("a", b"a")]));
        let locator = Locator::NamedArtifact {
            artifact_name: "model".to_string(),
        };

        let err = provider
            .fetch(&locator, "a", scratch.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(_)));
    }
}

//! Shared HTTP plumbing for the vendor clients.

use reqwest::{Response, StatusCode, Url};

use crate::error::RetrievalError;
use crate::request::ProviderKind;

/// User agent sent to vendor APIs (GitHub rejects requests without one).
pub const USER_AGENT: &str = concat!("mia-probe/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used by a provider.
pub fn build_client(provider: ProviderKind) -> Result<reqwest::Client, RetrievalError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| RetrievalError::Transport {
            provider,
            message: format!("failed to create HTTP client: {e}"),
        })
}

/// Parse a vendor endpoint and append the API root segments.
///
/// An endpoint that is not a usable URL cannot authenticate anything, so it
/// is reported as an authentication failure.
pub fn api_base(provider: ProviderKind, endpoint: &str, root: &[&str]) -> Result<Url, RetrievalError> {
    let base = Url::parse(endpoint.trim()).map_err(|e| RetrievalError::AuthFailure {
        provider,
        message: format!("invalid endpoint '{endpoint}': {e}"),
    })?;
    api_url(provider, &base, root)
}

/// Append percent-encoded path segments to `base`.
///
/// Each segment is encoded on its own, so `group/project` becomes
/// `group%2Fproject`.
pub fn api_url<S: AsRef<str>>(
    provider: ProviderKind,
    base: &Url,
    segments: &[S],
) -> Result<Url, RetrievalError> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| RetrievalError::AuthFailure {
            provider,
            message: format!("endpoint '{base}' cannot be used as an API base"),
        })?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// Map a send failure to a transport error.
pub fn transport_error(provider: ProviderKind, err: reqwest::Error) -> RetrievalError {
    RetrievalError::Transport {
        provider,
        message: err.to_string(),
    }
}

/// Classify a non-success status.
///
/// 401/403 are authentication failures; everything else is a refused lookup.
pub fn status_error(provider: ProviderKind, status: StatusCode, body: &str) -> RetrievalError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        body.trim().chars().take(512).collect()
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RetrievalError::AuthFailure {
            provider,
            message: format!("{}: {}", status.as_u16(), message),
        },
        _ => RetrievalError::Lookup {
            provider,
            status: status.as_u16(),
            message,
        },
    }
}

/// Pass successful responses through, turn the rest into errors.
pub async fn check_status(
    provider: ProviderKind,
    response: Response,
) -> Result<Response, RetrievalError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(provider, status, &body))
}

/// Read a full response body.
pub async fn read_bytes(
    provider: ProviderKind,
    response: Response,
) -> Result<Vec<u8>, RetrievalError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, e))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_auth_failure() {
        let err = status_error(ProviderKind::GitLab, StatusCode::UNAUTHORIZED, "");
        match err {
            RetrievalError::AuthFailure { provider, message } => {
                assert_eq!(provider, ProviderKind::GitLab);
                assert!(message.contains("401"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            status_error(ProviderKind::GitHub, StatusCode::FORBIDDEN, "bad credentials"),
            RetrievalError::AuthFailure { .. }
        ));
    }

    #[test]
    fn test_not_found_is_lookup_failure() {
        let err = status_error(
            ProviderKind::GitLab,
            StatusCode::NOT_FOUND,
            r#"{"message":"404 Project Not Found"}"#,
        );
        match err {
            RetrievalError::Lookup {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert!(message.contains("Project Not Found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_body_uses_canonical_reason() {
        let err = status_error(ProviderKind::GitHub, StatusCode::BAD_GATEWAY, "  ");
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn test_api_base_appends_root() {
        let url = api_base(ProviderKind::GitLab, "https://gitlab.example.com/", &["api", "v4"]).unwrap();
        assert_eq!(url.as_str(), "https://gitlab.example.com/api/v4");
    }

    #[test]
    fn test_api_url_encodes_each_segment() {
        let base = api_base(ProviderKind::GitLab, "https://gitlab.example.com", &["api", "v4"]).unwrap();
        let url = api_url(ProviderKind::GitLab, &base, &["projects", "group/sub/model"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/projects/group%2Fsub%2Fmodel"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_auth_failure() {
        let err = api_base(ProviderKind::GitLab, "not a url", &["api", "v4"]).unwrap_err();
        assert!(matches!(err, RetrievalError::AuthFailure { .. }));
    }

    #[test]
    fn test_user_agent_names_the_probe() {
        assert!(USER_AGENT.starts_with("mia-probe/"));
    }
}

//! Error types for artifact retrieval

use thiserror::Error;

use crate::request::ProviderKind;

/// Errors that can occur while locating and downloading a CI artifact
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The vendor rejected the credential
    #[error("{provider} authentication failed: {message}")]
    AuthFailure {
        provider: ProviderKind,
        message: String,
    },

    /// The requested artifact (or the file inside it) does not exist
    #[error("{0}")]
    NotFound(String),

    /// The vendor API answered, but refused a project, repository or bundle lookup
    #[error("{provider} lookup failed ({status}): {message}")]
    Lookup {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    /// The vendor could not be reached
    #[error("{provider} transport error: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },

    /// The downloaded bundle could not be stored or extracted
    #[error("Artifact bundle error: {0}")]
    Archive(String),
}

impl RetrievalError {
    /// Vendor the failure originated from, when known.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            RetrievalError::AuthFailure { provider, .. }
            | RetrievalError::Lookup { provider, .. }
            | RetrievalError::Transport { provider, .. } => Some(*provider),
            RetrievalError::NotFound(_) | RetrievalError::Archive(_) => None,
        }
    }
}

impl From<std::io::Error> for RetrievalError {
    fn from(err: std::io::Error) -> Self {
        RetrievalError::Archive(err.to_string())
    }
}

impl From<zip::result::ZipError> for RetrievalError {
    fn from(err: zip::result::ZipError) -> Self {
        RetrievalError::Archive(err.to_string())
    }
}

/// A provider discriminant that is neither `gitlab` nor `github`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported repository type: '{0}'")]
pub struct UnsupportedProvider(pub String);

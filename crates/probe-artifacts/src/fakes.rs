//! In-memory fakes for the provider traits (testing only)
//!
//! `StaticProvider` serves a fixed zip bundle with the same path rules as
//! the real vendors; `RecordingFactory` records which vendor was connected
//! and can be scripted to fail at connect or fetch time.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::archive;
use crate::error::RetrievalError;
use crate::handle::ArtifactHandle;
use crate::provider::{locator_mismatch, ArtifactProvider, ProviderFactory};
use crate::request::{Locator, ProviderKind, RetrievalRequest};

/// A scripted vendor failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeFailure {
    Auth(String),
    Lookup(u16, String),
    Transport(String),
    NotFound(String),
}

impl FakeFailure {
    fn to_error(&self, provider: ProviderKind) -> RetrievalError {
        match self {
            FakeFailure::Auth(message) => RetrievalError::AuthFailure {
                provider,
                message: message.clone(),
            },
            FakeFailure::Lookup(status, message) => RetrievalError::Lookup {
                provider,
                status: *status,
                message: message.clone(),
            },
            FakeFailure::Transport(message) => RetrievalError::Transport {
                provider,
                message: message.clone(),
            },
            FakeFailure::NotFound(message) => RetrievalError::NotFound(message.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticProvider
// ---------------------------------------------------------------------------

/// Provider that "downloads" a bundle held in memory.
#[derive(Debug)]
pub struct StaticProvider {
    kind: ProviderKind,
    bundle: Vec<u8>,
    fetch_failure: Option<FakeFailure>,
}

impl StaticProvider {
    pub fn new(kind: ProviderKind, bundle: Vec<u8>) -> Self {
        Self {
            kind,
            bundle,
            fetch_failure: None,
        }
    }

    /// Fail every `fetch` with `failure`.
    pub fn failing(kind: ProviderKind, failure: FakeFailure) -> Self {
        Self {
            kind,
            bundle: Vec::new(),
            fetch_failure: Some(failure),
        }
    }
}

#[async_trait]
impl ArtifactProvider for StaticProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(
        &self,
        locator: &Locator,
        artifact_path: &str,
        scratch: &Path,
    ) -> Result<ArtifactHandle, RetrievalError> {
        if locator.kind() != self.kind {
            return Err(locator_mismatch(self.kind, locator));
        }
        if let Some(failure) = &self.fetch_failure {
            return Err(failure.to_error(self.kind));
        }

        let root = archive::store_and_extract(&self.bundle, scratch)?;
        match self.kind {
            ProviderKind::GitLab => archive::open_extracted(&root, artifact_path),
            ProviderKind::GitHub => archive::open_extracted(&root, archive::basename(artifact_path)),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingFactory
// ---------------------------------------------------------------------------

/// Factory that hands out `StaticProvider`s and records every connection.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    bundle: Vec<u8>,
    connect_failure: Option<FakeFailure>,
    fetch_failure: Option<FakeFailure>,
    connections: Mutex<Vec<ProviderKind>>,
}

impl RecordingFactory {
    /// Connect successfully and serve `bundle`.
    pub fn serving(bundle: Vec<u8>) -> Self {
        Self {
            bundle,
            ..Self::default()
        }
    }

    /// Fail at construction time (e.g. rejected token).
    pub fn failing_connect(failure: FakeFailure) -> Self {
        Self {
            connect_failure: Some(failure),
            ..Self::default()
        }
    }

    /// Connect successfully but fail every fetch.
    pub fn failing_fetch(failure: FakeFailure) -> Self {
        Self {
            fetch_failure: Some(failure),
            ..Self::default()
        }
    }

    /// Vendors connected so far, in order.
    pub fn connections(&self) -> Vec<ProviderKind> {
        self.connections.lock().unwrap().clone()
    }

    fn connect(&self, kind: ProviderKind) -> Result<Box<dyn ArtifactProvider>, RetrievalError> {
        self.connections.lock().unwrap().push(kind);
        if let Some(failure) = &self.connect_failure {
            return Err(failure.to_error(kind));
        }
        let provider = match &self.fetch_failure {
            Some(failure) => StaticProvider::failing(kind, failure.clone()),
            None => StaticProvider::new(kind, self.bundle.clone()),
        };
        Ok(Box::new(provider))
    }
}

#[async_trait]
impl ProviderFactory for RecordingFactory {
    async fn connect_gitlab(
        &self,
        _request: &RetrievalRequest,
    ) -> Result<Box<dyn ArtifactProvider>, RetrievalError> {
        self.connect(ProviderKind::GitLab)
    }

    async fn connect_github(
        &self,
        _request: &RetrievalRequest,
    ) -> Result<Box<dyn ArtifactProvider>, RetrievalError> {
        self.connect(ProviderKind::GitHub)
    }
}

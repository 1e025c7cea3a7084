//! Probe-Artifacts: CI artifact retrieval for the membership-inference probe
//!
//! Normalises two structurally different CI vendor APIs into one
//! capability: given a locator, produce a readable handle to a single
//! extracted artifact file on local scratch storage.
//!
//! ## Key Components
//!
//! - `ArtifactProvider`: the `fetch` capability
//! - `GitLabProvider`: branch/job addressed artifacts (full relative path)
//! - `GitHubProvider`: named artifacts (file name only)
//! - `ArtifactSource`: selects and wraps the provider for a request
//! - `fakes`: in-memory providers for tests

pub mod archive;
mod error;
pub mod fakes;
pub mod github;
pub mod gitlab;
mod handle;
pub mod http;
pub mod provider;
mod request;

pub use error::{RetrievalError, UnsupportedProvider};
pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;
pub use handle::ArtifactHandle;
pub use provider::{ArtifactProvider, ArtifactSource, HttpProviderFactory, ProviderFactory};
pub use request::{Credential, Locator, ProviderKind, RetrievalRequest, DEFAULT_BRANCH};

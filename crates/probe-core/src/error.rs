//! Error taxonomy for the probe stages

use probe_artifacts::UnsupportedProvider;
use thiserror::Error;

/// Stage 1: the harness configuration is missing or invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required input field: {0}")]
    MissingField(&'static str),

    #[error("Missing credential: a token is required")]
    MissingCredential,

    #[error(transparent)]
    UnsupportedRepoType(#[from] UnsupportedProvider),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

/// Failure vocabulary of an inference engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The model's format/version marker is newer than the engine accepts
    #[error("{0}")]
    UnsupportedVersion(String),

    /// The file is not a well-formed model
    #[error("{0}")]
    InvalidModel(String),

    /// Graph analysis or execution failed
    #[error("{0}")]
    Runtime(String),
}

/// Marker engines put in unsupported-version messages.
pub const UNSUPPORTED_IR_VERSION: &str = "Unsupported model IR version";

impl EngineError {
    /// Classify a free-form engine message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(UNSUPPORTED_IR_VERSION) {
            EngineError::UnsupportedVersion(message)
        } else {
            EngineError::Runtime(message)
        }
    }
}

/// Model Loader failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Format/version mismatch that the one-shot downgrade did not fix
    #[error("{message}")]
    Unsupported {
        message: String,
        remediation_attempted: bool,
    },

    /// Not a readable model
    #[error("Corrupt model: {0}")]
    Corrupt(String),

    /// The engine failed to open the model
    #[error("{0}")]
    EngineFailure(String),
}

impl From<EngineError> for LoadError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnsupportedVersion(message) => LoadError::Unsupported {
                message,
                remediation_attempted: false,
            },
            EngineError::InvalidModel(message) => LoadError::Corrupt(message),
            EngineError::Runtime(message) => LoadError::EngineFailure(message),
        }
    }
}

/// Heuristic Analyzer failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Input shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("{0}")]
    EngineFailure(String),
}

impl From<EngineError> for AnalysisError {
    fn from(err: EngineError) -> Self {
        AnalysisError::EngineFailure(err.to_string())
    }
}

/// Stage 3 failures: loading or analysing the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelStageError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_message_classification() {
        let err = EngineError::from_message(
            "Unsupported model IR version: 11, max supported IR version: 10",
        );
        assert!(matches!(err, EngineError::UnsupportedVersion(_)));

        let err = EngineError::from_message("Node (MatMul) failed");
        assert!(matches!(err, EngineError::Runtime(_)));
    }

    #[test]
    fn test_engine_error_to_load_error() {
        let err: LoadError = EngineError::InvalidModel("truncated".to_string()).into();
        assert_eq!(err, LoadError::Corrupt("truncated".to_string()));

        let err: LoadError = EngineError::UnsupportedVersion("v11".to_string()).into();
        assert!(matches!(
            err,
            LoadError::Unsupported {
                remediation_attempted: false,
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_repo_type_message() {
        let err: ConfigError = UnsupportedProvider("svn".to_string()).into();
        assert_eq!(err.to_string(), "Unsupported repository type: 'svn'");
    }
}

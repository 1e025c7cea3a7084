//! Model Loader & Remediator.
//!
//! Opens a model with the inference engine. When the engine rejects the
//! model's IR version, the marker is downgraded once, the patched copy is
//! written next to the scratch files, and the open is retried exactly once.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::{Dim, InferenceEngine, InferenceSession, TensorSpec};
use crate::error::{EngineError, LoadError};
use crate::onnx::{self, REMEDIATED_IR_VERSION};

/// Prefix of the downgraded model copy.
pub const CONVERTED_PREFIX: &str = "converted_";

/// A loaded model plus the interface the analyzer needs.
pub struct ModelHandle {
    session: Box<dyn InferenceSession>,
    /// First declared input
    pub input_name: String,
    /// First declared output
    pub output_name: String,
    /// Declared shape of the first input (batch dimension usually symbolic)
    pub input_shape: Vec<Dim>,
    /// File the session was opened from
    pub model_path: PathBuf,
    /// Whether the IR version downgrade was applied
    pub remediated: bool,
}

impl ModelHandle {
    fn describe(
        session: Box<dyn InferenceSession>,
        model_path: &Path,
        remediated: bool,
    ) -> Result<Self, LoadError> {
        let input: TensorSpec = session
            .inputs()
            .first()
            .cloned()
            .ok_or_else(|| LoadError::Corrupt("model declares no inputs".to_string()))?;
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| LoadError::Corrupt("model declares no outputs".to_string()))?;

        Ok(Self {
            session,
            input_name: input.name,
            output_name,
            input_shape: input.shape,
            model_path: model_path.to_path_buf(),
            remediated,
        })
    }

    pub fn session(&self) -> &dyn InferenceSession {
        self.session.as_ref()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_shape", &self.input_shape)
            .field("model_path", &self.model_path)
            .field("remediated", &self.remediated)
            .finish_non_exhaustive()
    }
}

/// Loads models, writing remediated copies into `scratch`.
pub struct ModelLoader<'a> {
    engine: &'a dyn InferenceEngine,
    scratch: &'a Path,
}

impl<'a> ModelLoader<'a> {
    pub fn new(engine: &'a dyn InferenceEngine, scratch: &'a Path) -> Self {
        Self { engine, scratch }
    }

    /// Open `path`, downgrading the IR version at most once.
    pub fn load(&self, path: &Path) -> Result<ModelHandle, LoadError> {
        // First attempt: the model as downloaded.
        let first_failure = match self.engine.open(path) {
            Ok(session) => {
                info!(engine = self.engine.name(), path = %path.display(), "Model loaded");
                return ModelHandle::describe(session, path, false);
            }
            Err(EngineError::UnsupportedVersion(message)) => message,
            Err(other) => return Err(other.into()),
        };

        warn!(
            error = %first_failure,
            target_ir_version = REMEDIATED_IR_VERSION,
            "Unsupported model IR version, converting model"
        );
        let converted = self.remediate(path).map_err(|reason| LoadError::Unsupported {
            message: format!("{first_failure}; conversion failed: {reason}"),
            remediation_attempted: true,
        })?;

        // Second and last attempt: the downgraded copy.
        match self.engine.open(&converted) {
            Ok(session) => {
                info!(engine = self.engine.name(), path = %converted.display(), "Converted model loaded");
                ModelHandle::describe(session, &converted, true)
            }
            Err(EngineError::UnsupportedVersion(message)) => Err(LoadError::Unsupported {
                message,
                remediation_attempted: true,
            }),
            Err(other) => Err(other.into()),
        }
    }

    /// Write a copy of `path` with the IR version forced to the compatible value.
    pub fn remediate(&self, path: &Path) -> Result<PathBuf, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        let patched =
            onnx::set_ir_version(&bytes, REMEDIATED_IR_VERSION).map_err(|e| e.to_string())?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("model.onnx");
        let converted = self.scratch.join(format!("{CONVERTED_PREFIX}{file_name}"));
        std::fs::write(&converted, patched).map_err(|e| e.to_string())?;
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{linear_model, ScriptedEngine, ScriptedOpen};
    use crate::onnx::read_metadata;
    use prost::Message;
    use tempfile::tempdir;

    fn write_model(dir: &Path, ir_version: i64) -> PathBuf {
        let path = dir.join("model.onnx");
        std::fs::write(&path, linear_model(ir_version, 4, 5).encode_to_vec()).unwrap();
        path
    }

    #[test]
    fn test_first_attempt_success() {
        let dir = tempdir().unwrap();
        let path = write_model(dir.path(), 8);
        let engine = ScriptedEngine::new(vec![ScriptedOpen::FromFile(vec![1, 5])]);

        let handle = ModelLoader::new(&engine, dir.path()).load(&path).unwrap();
        assert_eq!(handle.input_name, "x");
        assert_eq!(handle.output_name, "y");
        assert_eq!(
            handle.input_shape,
            vec![Dim::Symbolic("N".to_string()), Dim::Fixed(4)]
        );
        assert!(!handle.remediated);
        assert_eq!(engine.opened(), vec![path]);
    }

    #[test]
    fn test_unsupported_version_is_remediated_once() {
        let dir = tempdir().unwrap();
        let path = write_model(dir.path(), 11);
        let engine = ScriptedEngine::new(vec![
            ScriptedOpen::Fail(EngineError::UnsupportedVersion(
                "Unsupported model IR version: 11".to_string(),
            )),
            ScriptedOpen::FromFile(vec![1, 1]),
        ]);

        let handle = ModelLoader::new(&engine, dir.path()).load(&path).unwrap();
        let converted = dir.path().join("converted_model.onnx");
        assert!(handle.remediated);
        assert_eq!(handle.model_path, converted);
        assert_eq!(engine.opened(), vec![path.clone(), converted.clone()]);

        let before = read_metadata(&std::fs::read(&path).unwrap()).unwrap();
        let after = read_metadata(&std::fs::read(&converted).unwrap()).unwrap();
        assert_eq!(after.ir_version, REMEDIATED_IR_VERSION);
        assert_eq!(before.inputs, after.inputs);
        assert_eq!(before.outputs, after.outputs);
    }

    #[test]
    fn test_remediation_is_not_repeated() {
        let dir = tempdir().unwrap();
        let path = write_model(dir.path(), 11);
        let unsupported =
            EngineError::UnsupportedVersion("Unsupported model IR version: 3".to_string());
        let engine = ScriptedEngine::new(vec![
            ScriptedOpen::Fail(unsupported.clone()),
            ScriptedOpen::Fail(unsupported.clone()),
            ScriptedOpen::FromFile(vec![1, 5]),
        ]);

        let err = ModelLoader::new(&engine, dir.path()).load(&path).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Unsupported {
                remediation_attempted: true,
                ..
            }
        ));
        assert_eq!(engine.opened().len(), 2);
    }

    #[test]
    fn test_other_failures_are_not_remediated() {
        let dir = tempdir().unwrap();
        let path = write_model(dir.path(), 8);
        let engine = ScriptedEngine::new(vec![ScriptedOpen::Fail(EngineError::Runtime(
            "Unsupported operator".to_string(),
        ))]);

        let err = ModelLoader::new(&engine, dir.path()).load(&path).unwrap_err();
        assert_eq!(err, LoadError::EngineFailure("Unsupported operator".to_string()));
        assert_eq!(engine.opened().len(), 1);
        assert!(!dir.path().join("converted_model.onnx").exists());
    }

    #[test]
    fn test_unconvertible_model_reports_attempt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"\x0a\xff").unwrap();
        let engine = ScriptedEngine::new(vec![ScriptedOpen::Fail(
            EngineError::UnsupportedVersion("Unsupported model IR version: 12".to_string()),
        )]);

        let err = ModelLoader::new(&engine, dir.path()).load(&path).unwrap_err();
        match err {
            LoadError::Unsupported {
                message,
                remediation_attempted,
            } => {
                assert!(remediation_attempted);
                assert!(message.contains("conversion failed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

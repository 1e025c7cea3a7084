//! The loader, remediation and analyzer against the real tract backend.

use probe_core::fakes::linear_model;
use probe_core::onnx::{read_metadata, REMEDIATED_IR_VERSION};
use probe_core::tract_engine::MAX_SUPPORTED_IR_VERSION;
use probe_core::{Analyzer, Dim, InferenceEngine, LoadError, ModelLoader, TractEngine};
use prost::Message;
use std::path::{Path, PathBuf};

fn write_model(dir: &Path, ir_version: i64, classes: i64) -> PathBuf {
    let path = dir.join("model.onnx");
    std::fs::write(&path, linear_model(ir_version, 8, classes).encode_to_vec()).unwrap();
    path
}

#[test]
fn test_tract_runs_linear_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(dir.path(), 8, 5);

    let engine = TractEngine::new();
    let handle = ModelLoader::new(&engine, dir.path()).load(&path).unwrap();
    assert_eq!(handle.input_name, "x");
    assert_eq!(
        handle.input_shape,
        vec![Dim::Symbolic("N".to_string()), Dim::Fixed(8)]
    );

    let verdict = Analyzer::with_seed(1).analyze(&handle).unwrap();
    assert_eq!(verdict.input_shape, vec![1, 8]);
    assert_eq!(verdict.output_shape, vec![1, 5]);
    assert!(verdict.vulnerable);
}

#[test]
fn test_tract_single_output_not_vulnerable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(dir.path(), 8, 1);

    let engine = TractEngine::new();
    let handle = ModelLoader::new(&engine, dir.path()).load(&path).unwrap();
    let verdict = Analyzer::with_seed(1).analyze(&handle).unwrap();
    assert_eq!(verdict.output_shape, vec![1, 1]);
    assert!(!verdict.vulnerable);
}

#[test]
fn test_newer_ir_version_is_remediated() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(dir.path(), MAX_SUPPORTED_IR_VERSION + 1, 5);

    let engine = TractEngine::new();
    assert!(engine.open(&path).is_err());

    let handle = ModelLoader::new(&engine, dir.path()).load(&path).unwrap();
    assert!(handle.remediated);
    assert_eq!(handle.model_path, dir.path().join("converted_model.onnx"));

    let before = read_metadata(&std::fs::read(&path).unwrap()).unwrap();
    let after = read_metadata(&std::fs::read(&handle.model_path).unwrap()).unwrap();
    assert_eq!(after.ir_version, REMEDIATED_IR_VERSION);
    assert_eq!(before.inputs, after.inputs);
    assert_eq!(before.outputs, after.outputs);

    let verdict = Analyzer::with_seed(1).analyze(&handle).unwrap();
    assert_eq!(verdict.output_shape, vec![1, 5]);
}

#[test]
fn test_garbage_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.onnx");
    std::fs::write(&path, b"\xff\xff\xff\xff").unwrap();

    let engine = TractEngine::new();
    let err = ModelLoader::new(&engine, dir.path()).load(&path).unwrap_err();
    assert!(matches!(err, LoadError::Corrupt(_)));
}

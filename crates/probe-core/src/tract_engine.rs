//! `tract-onnx` inference backend.

use std::path::Path;
use tract_onnx::prelude::*;
use tracing::debug;

use crate::engine::{InferenceEngine, InferenceSession, InputTensor, TensorSpec};
use crate::error::{EngineError, UNSUPPORTED_IR_VERSION};
use crate::onnx;

/// Highest ONNX IR version accepted without remediation.
pub const MAX_SUPPORTED_IR_VERSION: i64 = 10;

/// Pure-Rust ONNX engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct TractEngine;

impl TractEngine {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for TractEngine {
    fn name(&self) -> &'static str {
        "tract-onnx"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn InferenceSession>, EngineError> {
        let bytes = std::fs::read(path).map_err(|e| {
            EngineError::InvalidModel(format!("cannot read model {}: {e}", path.display()))
        })?;

        let metadata = onnx::read_metadata(&bytes)?;
        if metadata.ir_version > MAX_SUPPORTED_IR_VERSION {
            return Err(EngineError::UnsupportedVersion(format!(
                "{UNSUPPORTED_IR_VERSION}: {}, max supported IR version: {MAX_SUPPORTED_IR_VERSION}",
                metadata.ir_version
            )));
        }

        let model = tract_onnx::onnx()
            .model_for_read(&mut bytes.as_slice())
            .map_err(engine_failure)?;
        debug!(
            path = %path.display(),
            ir_version = metadata.ir_version,
            inputs = metadata.inputs.len(),
            outputs = metadata.outputs.len(),
            "Parsed ONNX model"
        );

        Ok(Box::new(TractSession {
            model,
            inputs: metadata.inputs,
            outputs: metadata.outputs,
        }))
    }
}

struct TractSession {
    model: InferenceModel,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
}

impl InferenceSession for TractSession {
    fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn run(
        &self,
        input_name: &str,
        input: &InputTensor,
        output_name: &str,
    ) -> Result<Vec<usize>, EngineError> {
        let input_ix = position(&self.inputs, input_name, "input")?;
        let output_ix = position(&self.outputs, output_name, "output")?;

        // Pin the probe input to a concrete shape and drop declared output
        // facts so symbolic batch dimensions do not have to unify.
        let mut model = self.model.clone();
        model
            .set_input_fact(input_ix, InferenceFact::from(f32::fact(input.shape.clone())))
            .map_err(engine_failure)?;
        for ix in 0..model.outputs.len() {
            model
                .set_output_fact(ix, InferenceFact::default())
                .map_err(engine_failure)?;
        }

        let plan = model
            .into_optimized()
            .map_err(engine_failure)?
            .into_runnable()
            .map_err(engine_failure)?;
        let tensor = Tensor::from_shape(&input.shape, &input.data).map_err(engine_failure)?;
        let outputs = plan.run(tvec!(tensor.into())).map_err(engine_failure)?;

        let output = outputs.get(output_ix).ok_or_else(|| {
            EngineError::Runtime(format!("engine returned no value for output '{output_name}'"))
        })?;
        Ok(output.shape().to_vec())
    }
}

fn position(specs: &[TensorSpec], name: &str, what: &str) -> Result<usize, EngineError> {
    specs
        .iter()
        .position(|s| s.name == name)
        .ok_or_else(|| EngineError::Runtime(format!("model has no {what} named '{name}'")))
}

fn engine_failure<E: std::fmt::Display>(err: E) -> EngineError {
    EngineError::from_message(format!("{err:#}"))
}

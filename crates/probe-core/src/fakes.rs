//! Scripted inference engine and model builders (testing only)
//!
//! `ScriptedEngine` answers each `open` with the next scripted outcome and
//! records what was opened and what was run, so remediation and analysis
//! can be exercised without a real ONNX runtime. `linear_model` builds a
//! small but valid ONNX graph for the tests that do use one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::engine::{InferenceEngine, InferenceSession, InputTensor, TensorSpec};
use crate::error::EngineError;
use crate::onnx::{
    self, dimension, type_proto, DimensionProto, GraphProto, ModelProto, NodeProto,
    OperatorSetIdProto, TensorProto, TensorShapeProto, TensorTypeProto, TypeProto,
    ValueInfoProto, ELEM_TYPE_FLOAT,
};

// ---------------------------------------------------------------------------
// ScriptedEngine
// ---------------------------------------------------------------------------

/// Outcome of one `open` call.
#[derive(Debug, Clone)]
pub enum ScriptedOpen {
    /// Open successfully, reading the interface from the model file; every
    /// run reports this output shape.
    FromFile(Vec<usize>),

    /// Open successfully from the file, but fail every run.
    FailingRun(EngineError),

    /// Fail the open.
    Fail(EngineError),
}

#[derive(Debug, Default)]
struct Journal {
    opened: Vec<PathBuf>,
    runs: Vec<InputTensor>,
}

/// Engine whose `open` results follow a script, one entry per call.
#[derive(Debug)]
pub struct ScriptedEngine {
    script: Mutex<Vec<ScriptedOpen>>,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedEngine {
    pub fn new(mut script: Vec<ScriptedOpen>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    /// Engine that opens every model and reports `output_shape`.
    pub fn returning(output_shape: Vec<usize>) -> Self {
        Self::new(vec![ScriptedOpen::FromFile(output_shape)])
    }

    /// Paths passed to `open`, in order.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.journal.lock().unwrap().opened.clone()
    }

    /// Tensors passed to `run`, in order.
    pub fn runs(&self) -> Vec<InputTensor> {
        self.journal.lock().unwrap().runs.clone()
    }
}

impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn InferenceSession>, EngineError> {
        self.journal.lock().unwrap().opened.push(path.to_path_buf());

        let outcome = {
            let mut script = self.script.lock().unwrap();
            // The last entry answers every call once the script runs out.
            if script.len() > 1 {
                script.pop()
            } else {
                script.last().cloned()
            }
        };

        let run = match outcome {
            Some(ScriptedOpen::FromFile(shape)) => Ok(shape),
            Some(ScriptedOpen::FailingRun(err)) => Err(err),
            Some(ScriptedOpen::Fail(err)) => return Err(err),
            None => {
                return Err(EngineError::Runtime(
                    "scripted engine has no outcome".to_string(),
                ))
            }
        };

        let bytes =
            std::fs::read(path).map_err(|e| EngineError::InvalidModel(e.to_string()))?;
        let metadata = onnx::read_metadata(&bytes)?;
        Ok(Box::new(ScriptedSession {
            inputs: metadata.inputs,
            outputs: metadata.outputs,
            run,
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct ScriptedSession {
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    run: Result<Vec<usize>, EngineError>,
    journal: Arc<Mutex<Journal>>,
}

impl InferenceSession for ScriptedSession {
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
        self.journal.lock().unwrap().runs.push(input.clone());

        let declared = self
            .inputs
            .iter()
            .find(|s| s.name == input_name)
            .ok_or_else(|| EngineError::Runtime(format!("unknown input '{input_name}'")))?;
        if !self.outputs.iter().any(|s| s.name == output_name) {
            return Err(EngineError::Runtime(format!(
                "unknown output '{output_name}'"
            )));
        }
        if declared.shape.len() != input.shape.len() {
            return Err(EngineError::Runtime(format!(
                "Invalid rank for input: {input_name} Got: {} Expected: {}",
                input.shape.len(),
                declared.shape.len()
            )));
        }
        if input.element_count() != input.data.len() {
            return Err(EngineError::Runtime(
                "input data does not match its shape".to_string(),
            ));
        }
        self.run.clone()
    }
}

// ---------------------------------------------------------------------------
// Model builders
// ---------------------------------------------------------------------------

/// Float tensor value info; `Ok` is a fixed dimension, `Err` a named one.
pub fn value_info(name: &str, dims: &[Result<i64, &str>]) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(TensorTypeProto {
                elem_type: ELEM_TYPE_FLOAT,
                shape: Some(TensorShapeProto {
                    dim: dims
                        .iter()
                        .map(|d| DimensionProto {
                            value: Some(match d {
                                Ok(v) => dimension::Value::DimValue(*v),
                                Err(p) => dimension::Value::DimParam(p.to_string()),
                            }),
                        })
                        .collect(),
                }),
            })),
        }),
    }
}

/// `y[N, classes] = MatMul(x[N, features], w)`
///
/// The weight initializer is also listed as a graph input, as older
/// exporters do.
pub fn linear_model(ir_version: i64, features: i64, classes: i64) -> ModelProto {
    let weights = TensorProto {
        dims: vec![features, classes],
        data_type: ELEM_TYPE_FLOAT,
        float_data: (0..features * classes).map(|i| (i as f32) * 0.01).collect(),
        name: "w".to_string(),
    };
    ModelProto {
        ir_version,
        producer_name: "probe-tests".to_string(),
        graph: Some(GraphProto {
            node: vec![NodeProto {
                input: vec!["x".to_string(), "w".to_string()],
                output: vec!["y".to_string()],
                name: "matmul".to_string(),
                op_type: "MatMul".to_string(),
            }],
            name: "linear".to_string(),
            initializer: vec![weights],
            input: vec![
                value_info("x", &[Err("N"), Ok(features)]),
                value_info("w", &[Ok(features), Ok(classes)]),
            ],
            output: vec![value_info("y", &[Err("N"), Ok(classes)])],
        }),
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: 13,
        }],
    }
}

/// Graph-less variant of `linear_model` whose only input is declared as `dims`.
pub fn model_with_input(ir_version: i64, dims: &[Result<i64, &str>]) -> ModelProto {
    let mut model = linear_model(ir_version, 4, 2);
    if let Some(graph) = model.graph.as_mut() {
        graph.initializer.clear();
        graph.node.clear();
        graph.input = vec![value_info("x", dims)];
    }
    model
}

//! Inference engine seam.
//!
//! The loader and analyzer only talk to these traits; `TractEngine` is the
//! production backend and `fakes::ScriptedEngine` the test double.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;

/// One tensor dimension as declared by the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    /// Known size
    Fixed(usize),

    /// Named or unknown size, typically the batch dimension
    Symbolic(String),
}

impl Dim {
    pub fn fixed(&self) -> Option<usize> {
        match self {
            Dim::Fixed(n) => Some(*n),
            Dim::Symbolic(_) => None,
        }
    }
}

impl std::fmt::Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Symbolic(name) => write!(f, "{name}"),
        }
    }
}

/// Name and declared shape of a graph input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<Dim>,
}

/// Dense f32 tensor fed to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl InputTensor {
    /// Number of elements implied by `shape`.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// An opened model, ready for forward passes.
pub trait InferenceSession: Send {
    /// Declared graph inputs, initializers excluded.
    fn inputs(&self) -> &[TensorSpec];

    /// Declared graph outputs.
    fn outputs(&self) -> &[TensorSpec];

    /// Run one forward pass and return the shape of `output_name`.
    fn run(
        &self,
        input_name: &str,
        input: &InputTensor,
        output_name: &str,
    ) -> Result<Vec<usize>, EngineError>;
}

/// Opens model files into sessions.
pub trait InferenceEngine: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Open the model at `path`.
    ///
    /// A model whose format version is newer than the engine supports must
    /// fail with `EngineError::UnsupportedVersion`.
    fn open(&self, path: &Path) -> Result<Box<dyn InferenceSession>, EngineError>;
}

/// Render a shape as `[N, 4]`.
pub fn format_shape<T: std::fmt::Display>(shape: &[T]) -> String {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("[{}]", dims.join(", "))
}

//! Heuristic Analyzer.
//!
//! Feeds one uniformly sampled input through the model and classifies the
//! output: a second dimension wider than one (a per-class score vector)
//! counts as exposing enough signal to be potentially vulnerable to
//! membership inference. This is a coarse screen, not a security proof.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{format_shape, Dim, InputTensor};
use crate::error::AnalysisError;
use crate::loader::ModelHandle;

/// Explanation attached to a vulnerable verdict.
pub const VULNERABLE_SUMMARY: &str =
    "The model is potentially vulnerable to membership inference attacks.";

/// Explanation attached to a not-vulnerable verdict.
pub const NOT_VULNERABLE_SUMMARY: &str =
    "The model is less vulnerable to membership inference attacks.";

/// Largest probe input, in elements, the analyzer will allocate.
pub const MAX_INPUT_ELEMENTS: usize = 1 << 26;

/// Outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    pub vulnerable: bool,
    pub explanation: String,
    /// Shape of the probe input actually fed to the model
    pub input_shape: Vec<usize>,
    /// Shape of the output tensor the verdict was derived from
    pub output_shape: Vec<usize>,
}

impl AnalysisVerdict {
    pub fn from_output(input_shape: Vec<usize>, output_shape: Vec<usize>) -> Self {
        let vulnerable = is_vulnerable(&output_shape);
        let explanation = if vulnerable {
            VULNERABLE_SUMMARY
        } else {
            NOT_VULNERABLE_SUMMARY
        };
        Self {
            vulnerable,
            explanation: explanation.to_string(),
            input_shape,
            output_shape,
        }
    }
}

/// `true` when the output has more than one dimension and the second
/// dimension is larger than one.
pub fn is_vulnerable(output_shape: &[usize]) -> bool {
    output_shape.len() > 1 && output_shape[1] > 1
}

/// Samples probe inputs and classifies models.
#[derive(Debug)]
pub struct Analyzer {
    rng: StdRng,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Entropy-seeded sampling.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sampling.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sample a `(1, declared[1..])` tensor with elements uniform in [0, 1).
    pub fn sample_input(&mut self, declared: &[Dim]) -> Result<InputTensor, AnalysisError> {
        let mut shape = vec![1];
        shape.extend(fixed_tail(declared)?);

        let uniform = Uniform::new(0.0f32, 1.0f32);
        let count = element_count(&shape)?;
        let data = (0..count).map(|_| uniform.sample(&mut self.rng)).collect();
        Ok(InputTensor { shape, data })
    }

    /// Sample an input for `model`, run it once and classify the output.
    pub fn analyze(&mut self, model: &ModelHandle) -> Result<AnalysisVerdict, AnalysisError> {
        let sample = self.sample_input(&model.input_shape)?;
        analyze_with_input(model, sample)
    }
}

/// Run `sample` through `model` and classify the output.
///
/// Deterministic for a given model and sample.
pub fn analyze_with_input(
    model: &ModelHandle,
    sample: InputTensor,
) -> Result<AnalysisVerdict, AnalysisError> {
    let input = adapt_input_shape(sample, &model.input_shape)?;
    debug!(
        input = %model.input_name,
        shape = %format_shape(&input.shape),
        "Running probe inference"
    );

    let output_shape = model
        .session()
        .run(&model.input_name, &input, &model.output_name)?;
    let verdict = AnalysisVerdict::from_output(input.shape, output_shape);
    info!(
        output = %model.output_name,
        output_shape = %format_shape(&verdict.output_shape),
        vulnerable = verdict.vulnerable,
        "Model classified"
    );
    Ok(verdict)
}

/// Reshape `sample` to `(-1, declared[1..])` when its rank differs from
/// the declared rank. The element count never changes.
pub fn adapt_input_shape(
    sample: InputTensor,
    declared: &[Dim],
) -> Result<InputTensor, AnalysisError> {
    if sample.shape.len() == declared.len() {
        return Ok(sample);
    }

    let tail = fixed_tail(declared)?;
    let tail_count = element_count(&tail)?;
    let total = sample.data.len();
    if tail_count == 0 || total % tail_count != 0 {
        return Err(AnalysisError::ShapeMismatch(format!(
            "cannot reshape {} elements to {}",
            total,
            format_shape(declared)
        )));
    }

    let mut shape = vec![total / tail_count];
    shape.extend(tail);
    if shape.len() != declared.len() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "sample of shape {} does not match declared input {}",
            format_shape(&shape),
            format_shape(declared)
        )));
    }
    Ok(InputTensor {
        shape,
        data: sample.data,
    })
}

/// Element count of `shape`, rejecting overflow and anything above
/// `MAX_INPUT_ELEMENTS`.
fn element_count(shape: &[usize]) -> Result<usize, AnalysisError> {
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&count| count <= MAX_INPUT_ELEMENTS)
        .ok_or_else(|| {
            AnalysisError::ShapeMismatch(format!(
                "input of shape {} exceeds {MAX_INPUT_ELEMENTS} elements",
                format_shape(shape)
            ))
        })
}

/// Concrete sizes of every dimension after the batch dimension.
fn fixed_tail(declared: &[Dim]) -> Result<Vec<usize>, AnalysisError> {
    declared
        .iter()
        .skip(1)
        .map(|d| {
            d.fixed().ok_or_else(|| {
                AnalysisError::ShapeMismatch(format!(
                    "input dimension '{d}' of {} has no fixed size",
                    format_shape(declared)
                ))
            })
        })
        .collect()
}

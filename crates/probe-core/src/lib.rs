//! Probe-Core: staged membership-inference screening of CI-built models
//!
//! Runs a fixed three-stage pipeline:
//! - `parse_input`: validate the harness configuration into a retrieval request
//! - `retrieve_artifact`: fetch the model through the matching CI provider
//! - `analyze_model`: load the model (downgrading its IR version once if the
//!   engine rejects it) and classify it from one probe inference
//!
//! Every expected boundary failure becomes a `ProbeResult` with one of five
//! integer outcomes; nothing recognised escapes as a raw error.

pub mod analyzer;
pub mod config;
pub mod engine;
mod error;
pub mod fakes;
pub mod loader;
pub mod onnx;
pub mod pipeline;
pub mod result;
pub mod scratch;
pub mod stage;
pub mod telemetry;
pub mod tract_engine;

// Re-export key types
pub use analyzer::{AnalysisVerdict, Analyzer};
pub use config::RawConfig;
pub use engine::{Dim, InferenceEngine, InferenceSession, InputTensor, TensorSpec};
pub use error::{
    AnalysisError, ConfigError, EngineError, LoadError, ModelStageError, UNSUPPORTED_IR_VERSION,
};
pub use loader::{ModelHandle, ModelLoader};
pub use pipeline::{PipelineOptions, PreparedArtifact, ProbeInput, ProbePipeline, ProbeRun};
pub use result::{IntegerResult, ProbeResult};
pub use scratch::ScratchSpace;
pub use stage::{Stage, StageRecord, StageStatus};
pub use telemetry::init_tracing;
pub use tract_engine::TractEngine;

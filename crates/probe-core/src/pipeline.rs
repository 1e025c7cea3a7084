//! Probe pipeline orchestration.
//!
//! The run is an explicit state machine over the three stages. Each stage
//! returns its own typed error; the transition out of a stage maps that
//! error exhaustively to a terminal `ProbeResult`, so a failure in one
//! stage never reaches the next. Conditions outside the taxonomy (scratch
//! storage cannot be created or written) leave `run` as `anyhow::Error`.

use anyhow::Context;
use chrono::{DateTime, Utc};
use probe_artifacts::{
    archive, ArtifactSource, Credential, ProviderFactory, ProviderKind, RetrievalError,
    RetrievalRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzer::Analyzer;
use crate::config::RawConfig;
use crate::engine::{format_shape, InferenceEngine};
use crate::error::{AnalysisError, ConfigError, LoadError, ModelStageError};
use crate::loader::ModelLoader;
use crate::result::{IntegerResult, ProbeResult};
use crate::scratch::ScratchSpace;
use crate::stage::{Stage, StageRecord, StageStatus};

/// Harness input: the option map plus the out-of-band credential.
#[derive(Debug, Clone)]
pub struct ProbeInput {
    /// `{"config": {...}}` or the flat option map
    pub config: Value,
    pub credential: Option<Credential>,
}

/// Knobs that do not come from the harness configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Seed for probe-input sampling; entropy-seeded when `None`
    pub seed: Option<u64>,

    /// Parent directory for the per-run scratch directory
    pub scratch_root: Option<PathBuf>,
}

/// The model file copied out of the extracted bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedArtifact {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Record of one complete probe run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRun {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Stages that ran, in order; none after a terminal failure
    pub stages: Vec<StageRecord>,
    pub result: ProbeResult,
}

impl ProbeRun {
    pub fn integer_result(&self) -> IntegerResult {
        self.result.integer_result
    }

    /// Whether `stage` was entered.
    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.iter().any(|r| r.stage == stage)
    }
}

enum State {
    ParseInput,
    RetrieveArtifact(RetrievalRequest),
    AnalyzeModel(PreparedArtifact),
    Finished(ProbeResult),
}

/// Probe pipeline orchestrator.
pub struct ProbePipeline;

impl ProbePipeline {
    /// Execute the three stages for one harness input.
    ///
    /// Always yields exactly one `ProbeResult` unless a fatal defect occurs.
    /// Scratch storage is removed before returning, on every path.
    pub async fn run(
        factory: &dyn ProviderFactory,
        engine: &dyn InferenceEngine,
        input: ProbeInput,
        options: &PipelineOptions,
    ) -> anyhow::Result<ProbeRun> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        let scratch = match &options.scratch_root {
            Some(root) => ScratchSpace::create_in(root),
            None => ScratchSpace::create(),
        }
        .context("Failed to create scratch directory")?;

        info!(run_id = %run_id, scratch = %scratch.path().display(), "Starting probe run");

        let mut analyzer = match options.seed {
            Some(seed) => Analyzer::with_seed(seed),
            None => Analyzer::new(),
        };
        let mut stages = Vec::new();
        let mut state = State::ParseInput;

        let result = loop {
            state = match state {
                State::ParseInput => {
                    let t = Instant::now();
                    let outcome = parse_input(&input);
                    stages.push(record(Stage::ParseInput, outcome.is_ok(), t));
                    match outcome {
                        Ok(request) => State::RetrieveArtifact(request),
                        Err(err) => State::Finished(config_failure(err)),
                    }
                }
                State::RetrieveArtifact(request) => {
                    let t = Instant::now();
                    let outcome = retrieve_artifact(factory, &request, &scratch).await?;
                    stages.push(record(Stage::RetrieveArtifact, outcome.is_ok(), t));
                    match outcome {
                        Ok(artifact) => State::AnalyzeModel(artifact),
                        Err(err) => State::Finished(retrieval_failure(err)),
                    }
                }
                State::AnalyzeModel(artifact) => {
                    let t = Instant::now();
                    let outcome = analyze_model(engine, &artifact, scratch.path(), &mut analyzer);
                    stages.push(record(Stage::AnalyzeModel, outcome.is_ok(), t));
                    State::Finished(outcome.unwrap_or_else(model_failure))
                }
                State::Finished(result) => break result,
            };
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            result = %result.integer_result,
            verdict = result.integer_result.is_verdict(),
            stages_passed = stages.iter().filter(|r| r.passed()).count(),
            duration_ms,
            "Probe run finished"
        );

        Ok(ProbeRun {
            run_id,
            started_at,
            duration_ms,
            stages,
            result,
        })
    }
}

fn record(stage: Stage, completed: bool, started: Instant) -> StageRecord {
    let status = if completed {
        StageStatus::Completed
    } else {
        StageStatus::Failed
    };
    StageRecord {
        stage,
        status,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

// ---------------------------------------------------------------------------
// Stage 1: parse input
// ---------------------------------------------------------------------------

fn parse_input(input: &ProbeInput) -> Result<RetrievalRequest, ConfigError> {
    let raw = RawConfig::from_json(&input.config)?;
    let request = raw.validate(input.credential.clone())?;
    info!(
        provider = %request.kind(),
        project = %request.project,
        artifact_path = %request.artifact_path,
        "Configuration validated"
    );
    Ok(request)
}

fn config_failure(err: ConfigError) -> ProbeResult {
    warn!(stage = %Stage::ParseInput, error = %err, "Configuration rejected");
    ProbeResult::failure(
        IntegerResult::InputError,
        "Parse Error: Unable to parse input.",
        Stage::ParseInput,
        err,
    )
}

// ---------------------------------------------------------------------------
// Stage 2: retrieve artifact
// ---------------------------------------------------------------------------

/// Fetch the artifact and copy it to `<scratch>/model/<file name>`.
///
/// The outer error is fatal; the inner one is a stage failure.
async fn retrieve_artifact(
    factory: &dyn ProviderFactory,
    request: &RetrievalRequest,
    scratch: &ScratchSpace,
) -> anyhow::Result<Result<PreparedArtifact, RetrievalError>> {
    let source = match ArtifactSource::create(factory, request).await {
        Ok(source) => source,
        Err(err) => return Ok(Err(err)),
    };
    let bytes = match source.fetch_request(request, scratch.path()).await {
        Ok(handle) => {
            debug!(path = %handle.path().display(), "Reading extracted artifact");
            match handle.into_bytes() {
                Ok(bytes) => bytes,
                Err(err) => return Ok(Err(err.into())),
            }
        }
        Err(err) => return Ok(Err(err)),
    };

    let path = scratch
        .model_file(archive::basename(&request.artifact_path))
        .context("Failed to create model directory")?;
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to persist model copy to {}", path.display()))?;

    let artifact = PreparedArtifact {
        sha256: hex::encode(Sha256::digest(&bytes)),
        size_bytes: bytes.len() as u64,
        path,
    };
    info!(
        path = %artifact.path.display(),
        sha256 = %artifact.sha256,
        size_bytes = artifact.size_bytes,
        "Artifact prepared"
    );
    Ok(Ok(artifact))
}

fn retrieval_failure(err: RetrievalError) -> ProbeResult {
    warn!(
        stage = %Stage::RetrieveArtifact,
        provider = ?err.provider(),
        error = %err,
        "Artifact retrieval failed"
    );
    let (code, message) = match &err {
        RetrievalError::NotFound(_) | RetrievalError::Archive(_) => {
            (IntegerResult::InputError, format!("Artifact Error: {err}"))
        }
        RetrievalError::AuthFailure { provider, .. } => (
            IntegerResult::TargetConnectionError,
            format!("{provider} Authentication Error: Unable to authenticate with {provider}."),
        ),
        RetrievalError::Lookup {
            provider: ProviderKind::GitLab,
            ..
        } => (
            IntegerResult::TargetConnectionError,
            "GitLab Get Error: Unable to retrieve data from GitLab.".to_string(),
        ),
        RetrievalError::Lookup {
            provider: ProviderKind::GitHub,
            ..
        } => (
            IntegerResult::TargetConnectionError,
            "GitHub Error: Unable to process GitHub request.".to_string(),
        ),
        RetrievalError::Transport { provider, .. } => (
            IntegerResult::TargetConnectionError,
            format!("{provider} Connection Error: Unable to reach {provider}."),
        ),
    };
    ProbeResult::failure(code, message, Stage::RetrieveArtifact, err)
}

// ---------------------------------------------------------------------------
// Stage 3: analyze model
// ---------------------------------------------------------------------------

fn analyze_model(
    engine: &dyn InferenceEngine,
    artifact: &PreparedArtifact,
    scratch: &Path,
    analyzer: &mut Analyzer,
) -> Result<ProbeResult, ModelStageError> {
    let model = ModelLoader::new(engine, scratch).load(&artifact.path)?;
    info!(
        input = %model.input_name,
        input_shape = %format_shape(&model.input_shape),
        output = %model.output_name,
        remediated = model.remediated,
        "Model ready for analysis"
    );
    let verdict = analyzer.analyze(&model)?;

    Ok(ProbeResult::verdict(&verdict)
        .with_detail("InputName", model.input_name.clone())
        .with_detail("OutputName", model.output_name.clone())
        .with_detail("InputShape", json!(model.input_shape))
        .with_detail("OutputShape", json!(verdict.output_shape))
        .with_detail("ModelSha256", artifact.sha256.clone())
        .with_detail("Remediated", model.remediated))
}

fn model_failure(err: ModelStageError) -> ProbeResult {
    warn!(stage = %Stage::AnalyzeModel, error = %err, "Model analysis failed");
    let (code, message) = match &err {
        ModelStageError::Load(LoadError::Unsupported {
            remediation_attempted: true,
            ..
        }) => (
            IntegerResult::TargetConnectionError,
            "ONNX Runtime Error: Unsupported model IR version. Conversion to a compatible IR version was attempted.".to_string(),
        ),
        ModelStageError::Load(LoadError::Unsupported {
            remediation_attempted: false,
            ..
        }) => (
            IntegerResult::TargetConnectionError,
            "ONNX Runtime Error: Unsupported model IR version.".to_string(),
        ),
        ModelStageError::Load(LoadError::Corrupt(_) | LoadError::EngineFailure(_))
        | ModelStageError::Analysis(AnalysisError::EngineFailure(_)) => (
            IntegerResult::TargetExecutionError,
            format!("ONNX Runtime Error: {err}"),
        ),
        ModelStageError::Analysis(AnalysisError::ShapeMismatch(_)) => (
            IntegerResult::TargetExecutionError,
            "Analysis Error: Unable to analyze the model.".to_string(),
        ),
    };
    ProbeResult::failure(code, message, Stage::AnalyzeModel, err)
}

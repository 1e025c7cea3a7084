//! Probe stage definitions and per-stage run records.

use serde::{Deserialize, Serialize};

/// The three probe stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Parse and validate the harness configuration
    ParseInput,

    /// Download, extract and persist the model artifact
    RetrieveArtifact,

    /// Load (remediating once if needed) and classify the model
    AnalyzeModel,
}

impl Stage {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ParseInput => "parse_input",
            Stage::RetrieveArtifact => "retrieve_artifact",
            Stage::AnalyzeModel => "analyze_model",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a stage ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Failed,
}

/// Record of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage that ran.
    pub stage: Stage,

    /// Whether it completed or produced a terminal failure.
    pub status: StageStatus,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl StageRecord {
    /// Whether this stage completed normally.
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Completed
    }
}

//! The result object handed back to the host harness.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::analyzer::AnalysisVerdict;
use crate::stage::Stage;

/// Outcome code of a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum IntegerResult {
    /// Not vulnerable
    False,
    /// Potentially vulnerable
    True,
    /// The configuration or the requested artifact is wrong
    InputError,
    /// The CI vendor or the model format could not be dealt with
    TargetConnectionError,
    /// Loading or running the model failed
    TargetExecutionError,
}

impl IntegerResult {
    pub fn code(self) -> i32 {
        match self {
            IntegerResult::False => 0,
            IntegerResult::True => 1,
            IntegerResult::InputError => 2,
            IntegerResult::TargetConnectionError => 3,
            IntegerResult::TargetExecutionError => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IntegerResult::False => "FALSE",
            IntegerResult::True => "TRUE",
            IntegerResult::InputError => "INPUT_ERROR",
            IntegerResult::TargetConnectionError => "TARGET_CONNECTION_ERROR",
            IntegerResult::TargetExecutionError => "TARGET_EXECUTION_ERROR",
        }
    }

    /// Whether the run reached a verdict.
    pub fn is_verdict(self) -> bool {
        matches!(self, IntegerResult::False | IntegerResult::True)
    }
}

impl std::fmt::Display for IntegerResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<IntegerResult> for i32 {
    fn from(result: IntegerResult) -> Self {
        result.code()
    }
}

impl TryFrom<i32> for IntegerResult {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => IntegerResult::False,
            1 => IntegerResult::True,
            2 => IntegerResult::InputError,
            3 => IntegerResult::TargetConnectionError,
            4 => IntegerResult::TargetExecutionError,
            other => return Err(format!("unknown result code {other}")),
        })
    }
}

/// Terminal output of a probe run: a code, a summary and a detail map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub integer_result: IntegerResult,
    pub pretty_result: String,
    pub extra_data: BTreeMap<String, Value>,
}

impl ProbeResult {
    /// Failure result; `Error` carries the underlying diagnostic.
    pub fn failure(
        integer_result: IntegerResult,
        pretty_result: impl Into<String>,
        stage: Stage,
        error: impl std::fmt::Display,
    ) -> Self {
        let mut extra_data = BTreeMap::new();
        extra_data.insert("Error".to_string(), Value::String(error.to_string()));
        extra_data.insert("Stage".to_string(), Value::String(stage.name().to_string()));
        Self {
            integer_result,
            pretty_result: pretty_result.into(),
            extra_data,
        }
    }

    /// Verdict result; TRUE when the model is potentially vulnerable.
    pub fn verdict(verdict: &AnalysisVerdict) -> Self {
        let integer_result = if verdict.vulnerable {
            IntegerResult::True
        } else {
            IntegerResult::False
        };
        Self {
            integer_result,
            pretty_result: verdict.explanation.clone(),
            extra_data: BTreeMap::new(),
        }
    }

    /// Add a detail entry.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra_data.insert(key.to_string(), value.into());
        self
    }

    /// The `Error` detail, if any.
    pub fn error(&self) -> Option<&str> {
        self.extra_data.get("Error").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codes_serialize_as_integers() {
        let result = ProbeResult::failure(
            IntegerResult::TargetConnectionError,
            "GitLab Authentication Error: Unable to authenticate with GitLab.",
            Stage::RetrieveArtifact,
            "401 Unauthorized",
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["integer_result"], json!(3));
        assert_eq!(value["extra_data"]["Error"], json!("401 Unauthorized"));
        assert_eq!(value["extra_data"]["Stage"], json!("retrieve_artifact"));
    }

    #[test]
    fn test_code_round_trip_and_unknown_code() {
        for code in 0..=4 {
            let result = IntegerResult::try_from(code).unwrap();
            assert_eq!(i32::from(result), code);
        }
        assert!(serde_json::from_value::<IntegerResult>(json!(9)).is_err());
    }

    #[test]
    fn test_verdict_result() {
        let verdict = AnalysisVerdict::from_output(vec![1, 4], vec![1, 5]);
        let result = ProbeResult::verdict(&verdict).with_detail("OutputShape", json!([1, 5]));
        assert_eq!(result.integer_result, IntegerResult::True);
        assert!(result.integer_result.is_verdict());
        assert_eq!(result.pretty_result, verdict.explanation);
        assert!(result.error().is_none());
        assert_eq!(result.extra_data["OutputShape"], json!([1, 5]));
    }
}

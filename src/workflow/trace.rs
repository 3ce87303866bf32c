//! The workflow trace: an append-only record of executed steps.

use crate::error::{Result, SkueError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a single tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    /// The tool failed; the output holds the error payload.
    Failure,
    /// The tool ran but its output is missing declared result fields.
    Partial,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Failure => write!(f, "failure"),
            StepStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Record of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub task: String,
    pub tool: String,
    /// Parameters after reference resolution.
    pub parameters: Map<String, Value>,
    pub output: Value,
    pub status: StepStatus,
    /// Short natural-language answer for this step.
    #[serde(default)]
    pub answer: String,
}

impl StepResult {
    pub fn is_failure(&self) -> bool {
        self.status == StepStatus::Failure
    }

    /// Compact one-line rendering used in prompts and logs.
    pub fn summary_line(&self) -> String {
        format!(
            "step {} [{}] {}: {}",
            self.index,
            self.tool,
            self.status,
            serde_json::to_string(&self.output).unwrap_or_default()
        )
    }
}

/// Ordered, append-only sequence of step results.
///
/// Entries are addressed by position. Nothing is ever removed or reordered,
/// so a reference to index `i` always sees the same result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    results: Vec<StepResult>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result. Its index must be the next free position.
    pub fn push(&mut self, result: StepResult) -> Result<()> {
        if result.index != self.results.len() {
            return Err(SkueError::InvalidInput(format!(
                "Step result index {} does not match trace position {}",
                result.index,
                self.results.len()
            )));
        }
        self.results.push(result);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&StepResult> {
        self.results.get(index)
    }

    pub fn last(&self) -> Option<&StepResult> {
        self.results.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Serialize as the pretty-printed workflow artifact.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a saved workflow, checking that indices are contiguous.
    pub fn from_json(json: &str) -> Result<Self> {
        let results: Vec<StepResult> = serde_json::from_str(json)?;
        let mut trace = Trace::new();
        for result in results {
            trace.push(result)?;
        }
        Ok(trace)
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a StepResult;
    type IntoIter = std::slice::Iter<'a, StepResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(index: usize, tool: &str, output: Value) -> StepResult {
        StepResult {
            index,
            task: format!("task {}", index),
            tool: tool.to_string(),
            parameters: Map::new(),
            output,
            status: StepStatus::Success,
            answer: String::new(),
        }
    }

    #[test]
    fn test_push_enforces_order() {
        let mut trace = Trace::new();
        trace.push(result(0, "Detector", json!({}))).unwrap();
        assert!(trace.push(result(2, "Counter", json!({}))).is_err());
        trace.push(result(1, "Counter", json!({}))).unwrap();
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn test_workflow_record_fields() {
        let mut trace = Trace::new();
        let mut step = result(0, "Counter", json!({"count": 7}));
        step.parameters.insert("prompt".to_string(), json!("red apples"));
        step.answer = "There are 7 red apples.".to_string();
        trace.push(step).unwrap();

        let value: Value = serde_json::from_str(&trace.to_json().unwrap()).unwrap();
        let record = &value[0];
        assert_eq!(record["task"], "task 0");
        assert_eq!(record["tool"], "Counter");
        assert_eq!(record["parameters"]["prompt"], "red apples");
        assert_eq!(record["output"]["count"], 7);
        assert_eq!(record["status"], "success");
        assert_eq!(record["answer"], "There are 7 red apples.");
    }

    #[test]
    fn test_from_json_rejects_gaps() {
        let json = r#"[{"index": 1, "task": "t", "tool": "x", "parameters": {}, "output": null, "status": "success"}]"#;
        assert!(Trace::from_json(json).is_err());
    }

    #[test]
    fn test_json_reload_is_identical() {
        let mut trace = Trace::new();
        trace.push(result(0, "Detector", json!({"bboxes": [[1, 2, 3, 4]]}))).unwrap();
        let json = trace.to_json().unwrap();
        let reloaded = Trace::from_json(&json).unwrap();
        assert_eq!(reloaded, trace);
        assert_eq!(reloaded.to_json().unwrap(), json);
    }
}

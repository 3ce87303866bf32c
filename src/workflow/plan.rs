//! Planned and resolved steps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step proposed by the planner.
///
/// Parameter values are JSON literals or reference tokens (`$input`,
/// `$step[i]`, `$step[i].field`). A step is never mutated after planning;
/// binding produces a separate [`ResolvedStep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// What this step is meant to achieve.
    pub task: String,
    /// Name of a registered tool.
    pub tool: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl PlanStep {
    pub fn new(task: &str, tool: &str, parameters: Value) -> Self {
        Self {
            task: task.to_string(),
            tool: tool.to_string(),
            parameters: match parameters {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

/// An ordered plan for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "plan")]
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A plan step with every reference replaced by a concrete value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStep {
    /// Position the result will take in the trace.
    pub index: usize,
    pub task: String,
    pub tool: String,
    pub parameters: Map<String, Value>,
}

//! Tool execution with contract checks.

use super::{FailureKind, ToolDescriptor, ToolFailure, ToolRegistry};
use crate::error::Result;
use crate::workflow::{ResolvedStep, StepResult, StepStatus};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Invokes registered tools and turns every outcome into a [`StepResult`].
///
/// Tool failures never escape as errors: they come back as a result with
/// `status = failure` and a structured error payload. Only an unknown tool
/// name is reported as an error, since that is a contract violation rather
/// than a runtime fault. Nothing is retried here.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    #[instrument(skip(self, step), fields(index = step.index, tool = %step.tool))]
    pub async fn execute(&self, step: &ResolvedStep) -> Result<StepResult> {
        let handle = self.registry.resolve(&step.tool)?;
        let descriptor = self.registry.descriptor(&step.tool)?;

        let parameters = match prepare_parameters(&descriptor, &step.parameters) {
            Ok(parameters) => parameters,
            Err(failure) => {
                warn!("Rejected parameters for {}: {}", step.tool, failure.message);
                return Ok(failed(step, step.parameters.clone(), failure));
            }
        };

        let result = match handle.invoke(&Value::Object(parameters.clone())).await {
            Ok(output) => {
                let status = check_output(&descriptor, &output);
                debug!("Tool {} finished with status {}", step.tool, status);
                StepResult {
                    index: step.index,
                    task: step.task.clone(),
                    tool: step.tool.clone(),
                    parameters,
                    output,
                    status,
                    answer: String::new(),
                }
            }
            Err(failure) => {
                warn!("Tool {} failed: {}", step.tool, failure);
                failed(step, parameters, failure)
            }
        };

        Ok(result)
    }
}

/// Fill defaults and check parameters against the descriptor.
fn prepare_parameters(
    descriptor: &ToolDescriptor,
    parameters: &Map<String, Value>,
) -> std::result::Result<Map<String, Value>, ToolFailure> {
    let mut problems = Vec::new();

    for name in parameters.keys() {
        if descriptor.parameter(name).is_none() {
            problems.push(format!("unknown parameter '{}'", name));
        }
    }

    let mut prepared = parameters.clone();
    for spec in &descriptor.parameters {
        match parameters.get(&spec.name) {
            Some(value) if !spec.kind.accepts(value) => problems.push(format!(
                "parameter '{}' should be {}, got {}",
                spec.name,
                spec.kind,
                kind_of(value)
            )),
            Some(_) => {}
            None if spec.required => {
                problems.push(format!("missing required parameter '{}'", spec.name))
            }
            None => {
                if let Some(default) = &spec.default {
                    prepared.insert(spec.name.clone(), default.clone());
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(prepared)
    } else {
        Err(ToolFailure::new(FailureKind::InvalidParameters, problems.join("; ")))
    }
}

/// Success when every declared result field is present, partial otherwise.
fn check_output(descriptor: &ToolDescriptor, output: &Value) -> StepStatus {
    if descriptor.returns.is_empty() {
        return StepStatus::Success;
    }
    let complete = match output.as_object() {
        Some(map) => descriptor.returns.iter().all(|f| match map.get(&f.name) {
            Some(value) => f.kind.accepts(value),
            None => false,
        }),
        None => false,
    };
    if complete {
        StepStatus::Success
    } else {
        StepStatus::Partial
    }
}

fn failed(step: &ResolvedStep, parameters: Map<String, Value>, failure: ToolFailure) -> StepResult {
    StepResult {
        index: step.index,
        task: step.task.clone(),
        tool: step.tool.clone(),
        parameters,
        output: failure.to_output(),
        status: StepStatus::Failure,
        answer: failure.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

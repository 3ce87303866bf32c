//! Vision tools: contracts, registry and execution.
//!
//! A tool is anything that can be expressed as a function from structured
//! parameters to a structured result. Detection, segmentation, counting or
//! geometry helpers all live outside this crate; Skue only knows their
//! [`ToolDescriptor`] and a [`ToolHandle`] to call.

mod executor;
mod registry;
mod remote;

pub use executor::ToolExecutor;
pub use registry::ToolRegistry;
pub use remote::RemoteTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of a parameter or result field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Path to an image or video, usually `$input`.
    Image,
    #[default]
    Any,
}

impl ParamKind {
    /// Check whether a concrete value conforms to this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String | ParamKind::Image => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
            ParamKind::Any => true,
        }
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
            ParamKind::Image => "image",
            ParamKind::Any => "any",
        };
        write!(f, "{}", name)
    }
}

fn default_required() -> bool {
    true
}

/// A named, typed tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKind,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Value used when an optional parameter is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    pub fn optional(name: &str, kind: ParamKind, default: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            default,
            description: String::new(),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// A named field in a tool's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: String::new(),
        }
    }
}

/// Invocation contract of a registered tool. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
    #[serde(default)]
    pub returns: Vec<FieldSpec>,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn returns(mut self, field: FieldSpec) -> Self {
        self.returns.push(field);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Render the contract for the planner prompt.
    pub fn describe_for_prompt(&self) -> String {
        let mut out = format!("- {}: {}\n", self.name, self.description);

        if self.parameters.is_empty() {
            out.push_str("  parameters: none\n");
        } else {
            out.push_str("  parameters:\n");
            for p in &self.parameters {
                let requirement = if p.required { "required" } else { "optional" };
                out.push_str(&format!("    - {} ({}, {})", p.name, p.kind, requirement));
                if let Some(default) = &p.default {
                    out.push_str(&format!(" default {}", default));
                }
                if !p.description.is_empty() {
                    out.push_str(&format!(": {}", p.description));
                }
                out.push('\n');
            }
        }

        if !self.returns.is_empty() {
            let fields = self
                .returns
                .iter()
                .map(|f| format!("{} ({})", f.name, f.kind))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("  returns: {}\n", fields));
        }

        out
    }
}

/// Category of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Parameters did not match the descriptor.
    InvalidParameters,
    /// The tool ran and reported an error.
    Invocation,
    /// The tool could not be reached.
    Transport,
    /// The tool returned something that is not a structured result.
    InvalidOutput,
}

/// Structured error payload produced by a failing tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invocation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Invocation, message)
    }

    /// The payload stored as a failed step's output.
    pub fn to_output(&self) -> Value {
        serde_json::json!({ "error": self })
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = serde_json::to_value(self.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "{}: {}", kind, self.message)
    }
}

/// Executable side of a tool.
#[async_trait]
pub trait ToolHandle: Send + Sync {
    /// Invoke the tool with concrete parameters.
    async fn invoke(&self, parameters: &Value) -> std::result::Result<Value, ToolFailure>;
}

/// A tool backed by a local function.
pub struct FnTool<F>
where
    F: Fn(&Value) -> std::result::Result<Value, ToolFailure> + Send + Sync,
{
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&Value) -> std::result::Result<Value, ToolFailure> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> ToolHandle for FnTool<F>
where
    F: Fn(&Value) -> std::result::Result<Value, ToolFailure> + Send + Sync,
{
    async fn invoke(&self, parameters: &Value) -> std::result::Result<Value, ToolFailure> {
        (self.func)(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_kind_accepts() {
        assert!(ParamKind::Integer.accepts(&json!(7)));
        assert!(!ParamKind::Integer.accepts(&json!(7.5)));
        assert!(ParamKind::Number.accepts(&json!(7.5)));
        assert!(ParamKind::Image.accepts(&json!("apples.png")));
        assert!(!ParamKind::Array.accepts(&json!({"a": 1})));
        assert!(ParamKind::Any.accepts(&Value::Null));
    }

    #[test]
    fn test_describe_for_prompt() {
        let descriptor = ToolDescriptor::new("Counter", "Counts objects in an image")
            .param(ParamSpec::required("prompt", ParamKind::String))
            .param(ParamSpec::required("image", ParamKind::Image))
            .param(ParamSpec::optional("threshold", ParamKind::Number, Some(json!(0.3))))
            .returns(FieldSpec::new("count", ParamKind::Integer));

        let text = descriptor.describe_for_prompt();
        assert!(text.starts_with("- Counter: Counts objects in an image"));
        assert!(text.contains("prompt (string, required)"));
        assert!(text.contains("threshold (number, optional) default 0.3"));
        assert!(text.contains("returns: count (integer)"));
    }

    #[test]
    fn test_failure_payload() {
        let failure = ToolFailure::invocation("model crashed");
        assert_eq!(
            failure.to_output(),
            json!({"error": {"kind": "invocation", "message": "model crashed"}})
        );
        assert_eq!(failure.to_string(), "invocation: model crashed");
    }

    #[test]
    fn test_fn_tool_invoke() {
        let tool = FnTool::new(|params: &Value| Ok(json!({ "echo": params["x"].clone() })));
        let output = tokio_test::block_on(tool.invoke(&json!({"x": 3}))).unwrap();
        assert_eq!(output, json!({"echo": 3}));
    }
}

//! In-crate fakes for the completion capability and tools.

use crate::error::{Result, SkueError};
use crate::lmm::{Completion, CompletionRequest, ResponseFormat};
use crate::tools::{FieldSpec, FnTool, ParamKind, ParamSpec, ToolDescriptor, ToolFailure, ToolRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// A completion backend driven by a closure. Every request is recorded.
pub struct FakeLmm {
    respond: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeLmm {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies in order; fails once the script runs out.
    pub fn scripted(replies: Vec<&str>) -> Self {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(replies.into_iter().map(str::to_string).collect());
        Self::new(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SkueError::CompletionUnavailable("script exhausted".to_string()))
        })
    }

    /// Planner requests (JSON format) get `plans` in order; everything else
    /// gets `answer`.
    pub fn routed(plans: Vec<&str>, answer: &str) -> Self {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(plans.into_iter().map(str::to_string).collect());
        let answer = answer.to_string();
        Self::new(move |request| match request.format {
            ResponseFormat::Json => queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SkueError::CompletionUnavailable("no plan scripted".to_string())),
            ResponseFormat::Text => Ok(answer.clone()),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn planner_calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.format == ResponseFormat::Json)
            .count()
    }
}

#[async_trait]
impl Completion for FakeLmm {
    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }

    fn model(&self) -> &str {
        "fake"
    }
}

/// Descriptor of the `Counter` tool used across tests.
pub fn counter_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("Counter", "Counts objects matching a prompt")
        .param(ParamSpec::required("prompt", ParamKind::String))
        .param(ParamSpec::required("image", ParamKind::Image))
        .returns(FieldSpec::new("count", ParamKind::Integer))
}

/// Registry with a `Counter` that reports 7, or fails for the prompt "crash".
pub fn counter_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            counter_descriptor(),
            Arc::new(FnTool::new(|params: &Value| {
                if params["prompt"] == "crash" {
                    return Err(ToolFailure::invocation("model crashed"));
                }
                Ok(json!({"count": 7}))
            })),
        )
        .unwrap();
    registry
}

/// Registry with a `Detector` returning one box and a `Crop` echoing its box.
pub fn detector_registry() -> ToolRegistry {
    let mut registry = counter_registry();
    registry
        .register(
            ToolDescriptor::new("Detector", "Detects objects and returns bounding boxes")
                .param(ParamSpec::required("prompt", ParamKind::String))
                .param(ParamSpec::required("image", ParamKind::Image))
                .returns(FieldSpec::new("bboxes", ParamKind::Array)),
            Arc::new(FnTool::new(|_: &Value| Ok(json!({"bboxes": [[10, 20, 50, 80]]})))),
        )
        .unwrap();
    registry
        .register(
            ToolDescriptor::new("Crop", "Crops the image to a box")
                .param(ParamSpec::required("image", ParamKind::Image))
                .param(ParamSpec::required("bbox", ParamKind::Any))
                .returns(FieldSpec::new("cropped", ParamKind::Any)),
            Arc::new(FnTool::new(|params: &Value| {
                Ok(json!({"cropped": params["bbox"].clone()}))
            })),
        )
        .unwrap();
    registry
}

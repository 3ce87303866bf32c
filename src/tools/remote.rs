//! Tools served over HTTP.

use super::{FailureKind, ParamKind, ToolDescriptor, ToolFailure, ToolHandle};
use crate::config::ToolSettings;
use crate::error::{Result, SkueError};
use crate::media::encode_file;
use crate::openai::http_client;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// A tool hosted behind an HTTP endpoint.
///
/// Parameters are posted as `{"parameters": {...}}`; the JSON response body is
/// the tool result. Image parameters are sent as base64 file contents.
pub struct RemoteTool {
    name: String,
    endpoint: url::Url,
    http: reqwest::Client,
    image_params: Vec<String>,
}

impl RemoteTool {
    pub fn from_settings(settings: &ToolSettings, descriptor: &ToolDescriptor) -> Result<Self> {
        let endpoint = url::Url::parse(&settings.endpoint).map_err(|e| {
            SkueError::Config(format!(
                "Invalid endpoint '{}' for tool {}: {}",
                settings.endpoint, settings.name, e
            ))
        })?;

        Ok(Self {
            name: settings.name.clone(),
            endpoint,
            http: http_client(Duration::from_secs(settings.timeout_secs))?,
            image_params: descriptor
                .parameters
                .iter()
                .filter(|p| p.kind == ParamKind::Image)
                .map(|p| p.name.clone())
                .collect(),
        })
    }

    /// Replace image paths with their base64 contents.
    fn encode_images(&self, parameters: &Value) -> std::result::Result<Value, ToolFailure> {
        let mut payload = parameters.clone();
        if let Some(map) = payload.as_object_mut() {
            for name in &self.image_params {
                let path = match map.get(name) {
                    Some(Value::String(path)) => path.clone(),
                    _ => continue,
                };
                let encoded = encode_file(Path::new(&path)).map_err(|e| {
                    ToolFailure::new(FailureKind::InvalidParameters, e.to_string())
                })?;
                map.insert(name.clone(), Value::String(encoded));
            }
        }
        Ok(payload)
    }
}

#[async_trait]
impl ToolHandle for RemoteTool {
    #[instrument(skip(self, parameters), fields(tool = %self.name))]
    async fn invoke(&self, parameters: &Value) -> std::result::Result<Value, ToolFailure> {
        let payload = self.encode_images(parameters)?;

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "parameters": payload }))
            .send()
            .await
            .map_err(|e| ToolFailure::new(FailureKind::Transport, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolFailure::new(FailureKind::Transport, e.to_string()))?;
        debug!("Tool responded with {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(ToolFailure::invocation(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        parse_body(&body)
    }
}

/// Interpret a tool response body.
fn parse_body(body: &str) -> std::result::Result<Value, ToolFailure> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        ToolFailure::new(FailureKind::InvalidOutput, format!("Response is not JSON: {}", e))
    })?;

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(ToolFailure::invocation(message.to_string()));
    }

    Ok(value)
}

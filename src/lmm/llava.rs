//! Hosted LLaVA backend.

use super::{Completion, CompletionRequest, Role};
use crate::config::LmmSettings;
use crate::error::{Result, SkueError};
use crate::openai::http_client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument};

/// LLaVA served behind a single JSON endpoint.
pub struct LlavaLmm {
    http: reqwest::Client,
    endpoint: url::Url,
    model: String,
    temperature: f32,
    max_new_tokens: u32,
}

#[derive(Debug, Serialize)]
struct LlavaRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    temperature: f32,
    max_new_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct LlavaResponse {
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
    #[serde(default)]
    data: Option<String>,
}

impl LlavaLmm {
    pub fn with_settings(settings: &LmmSettings) -> Result<Self> {
        if settings.llava_endpoint.is_empty() {
            return Err(SkueError::Config(
                "lmm.llava_endpoint must be set for the llava provider".to_string(),
            ));
        }
        let endpoint = url::Url::parse(&settings.llava_endpoint).map_err(|e| {
            SkueError::Config(format!("Invalid llava_endpoint '{}': {}", settings.llava_endpoint, e))
        })?;

        Ok(Self {
            http: http_client(Duration::from_secs(settings.timeout_secs))?,
            endpoint,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_new_tokens: 1500,
        })
    }

    /// Flatten a request into the single prompt LLaVA accepts.
    fn flatten_prompt(request: &CompletionRequest) -> Result<String> {
        let conversational = request
            .turns
            .iter()
            .filter(|t| t.role != Role::System)
            .count()
            > 1;
        if conversational {
            return Err(SkueError::InvalidInput(
                "Multi-turn chat is not supported by the llava provider".to_string(),
            ));
        }

        let mut sections: Vec<&str> = Vec::new();
        if let Some(system) = &request.system {
            sections.push(system);
        }
        sections.extend(request.turns.iter().map(|t| t.content.as_str()));
        Ok(sections.join("\n\n"))
    }

    fn parse_response(body: LlavaResponse) -> Result<String> {
        match (body.status_code, body.data) {
            (Some(200), Some(data)) => Ok(data),
            (status, _) => {
                error!("LLaVA request failed with status {:?}", status);
                Err(SkueError::CompletionUnavailable(format!(
                    "LLaVA request failed (statusCode: {:?})",
                    status
                )))
            }
        }
    }
}

#[async_trait]
impl Completion for LlavaLmm {
    #[instrument(skip(self, request), fields(endpoint = %self.endpoint))]
    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let image = match &request.media {
            Some(media) => Some(media.encode_base64()?),
            None => None,
        };

        let body = LlavaRequest {
            prompt: Self::flatten_prompt(request)?,
            image,
            temperature: self.temperature,
            max_new_tokens: self.max_new_tokens,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| SkueError::CompletionUnavailable(format!("LLaVA transport error: {}", e)))?;

        let parsed: LlavaResponse = response
            .json()
            .await
            .map_err(|e| SkueError::CompletionUnavailable(format!("Invalid LLaVA response: {}", e)))?;

        Self::parse_response(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lmm::ChatTurn;

    #[test]
    fn test_flatten_prompt() {
        let request = CompletionRequest::prompt("count apples").with_system("You plan.");
        assert_eq!(
            LlavaLmm::flatten_prompt(&request).unwrap(),
            "You plan.\n\ncount apples"
        );
    }

    #[test]
    fn test_flatten_rejects_chat() {
        let mut request = CompletionRequest::prompt("hi");
        request.turns.push(ChatTurn::assistant("hello"));
        assert!(LlavaLmm::flatten_prompt(&request).is_err());
    }

    #[test]
    fn test_parse_response_status() {
        let ok = LlavaResponse {
            status_code: Some(200),
            data: Some("seven apples".to_string()),
        };
        assert_eq!(LlavaLmm::parse_response(ok).unwrap(), "seven apples");

        let failed = LlavaResponse {
            status_code: Some(500),
            data: None,
        };
        assert!(matches!(
            LlavaLmm::parse_response(failed),
            Err(SkueError::CompletionUnavailable(_))
        ));

        let missing: LlavaResponse = serde_json::from_str(r#"{"data": "x"}"#).unwrap();
        assert!(LlavaLmm::parse_response(missing).is_err());
    }
}

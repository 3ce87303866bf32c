//! Completion capability backed by a large multimodal model.
//!
//! The workflow engine only ever talks to the [`Completion`] trait. Planning,
//! per-step narratives and answer synthesis all build a [`CompletionRequest`]
//! and get text back; whether that text comes from OpenAI, a hosted LLaVA
//! endpoint or a scripted fake in tests is decided once at startup.

mod llava;
mod openai;

pub use llava::LlavaLmm;
pub use openai::OpenAILmm;

use crate::config::{LmmProvider, LmmSettings};
use crate::error::Result;
use crate::media::MediaRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single `{role, content}` turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Shape of the expected completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// A single JSON object.
    Json,
}

/// A request to the completion capability.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub turns: Vec<ChatTurn>,
    /// Media attached to the first user turn.
    pub media: Option<MediaRef>,
    pub format: ResponseFormat,
}

impl CompletionRequest {
    /// A single-prompt request.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![ChatTurn::user(prompt)],
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_media(mut self, media: Option<&MediaRef>) -> Self {
        self.media = media.cloned();
        self
    }

    pub fn json(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }

    /// Text of the last user turn.
    pub fn last_user_content(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}

/// Trait for completion services.
///
/// Transport and auth failures are reported as
/// [`SkueError::CompletionUnavailable`](crate::error::SkueError::CompletionUnavailable);
/// implementations never retry on their own.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Generate a completion for the request.
    async fn generate(&self, request: &CompletionRequest) -> Result<String>;

    /// Model name, for logging.
    fn model(&self) -> &str;
}

/// Build the configured completion backend.
pub fn from_settings(settings: &LmmSettings) -> Result<Arc<dyn Completion>> {
    match settings.provider {
        LmmProvider::OpenAI => Ok(Arc::new(OpenAILmm::with_settings(settings)?)),
        LmmProvider::Llava => Ok(Arc::new(LlavaLmm::with_settings(settings)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_user_content() {
        let mut request = CompletionRequest::prompt("first");
        request.turns.push(ChatTurn::assistant("reply"));
        request.turns.push(ChatTurn::user("second"));
        assert_eq!(request.last_user_content(), Some("second"));
    }

    #[test]
    fn test_from_settings_llava_requires_endpoint() {
        let settings = LmmSettings {
            provider: LmmProvider::Llava,
            ..Default::default()
        };
        assert!(from_settings(&settings).is_err());
    }

    #[test]
    fn test_turn_serialization() {
        let turn = ChatTurn::user("hi");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}

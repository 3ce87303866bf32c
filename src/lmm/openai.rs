//! OpenAI vision model backend.

use super::{Completion, CompletionRequest, ResponseFormat, Role};
use crate::config::LmmSettings;
use crate::error::{Result, SkueError};
use crate::media::{MediaKind, MediaRef};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
    ResponseFormat as OpenAIResponseFormat,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI chat completions with image input.
pub struct OpenAILmm {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    detail: ImageDetail,
}

impl OpenAILmm {
    /// Create a backend for the given model with default limits.
    pub fn new(model: &str) -> Result<Self> {
        Self::with_settings(&LmmSettings {
            model: model.to_string(),
            ..Default::default()
        })
    }

    pub fn with_settings(settings: &LmmSettings) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(Duration::from_secs(settings.timeout_secs))?,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            detail: parse_detail(&settings.image_detail),
        })
    }

    fn build_messages(&self, request: &CompletionRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(system) = &request.system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
            );
        }

        // The image rides along with the first user turn only.
        let mut image_part = match &request.media {
            Some(media) if media.kind == MediaKind::Image => {
                Some(image_content_part(media, &self.detail)?)
            }
            Some(media) => {
                debug!("Not attaching {} media to the completion request", media.kind);
                None
            }
            None => None,
        };

        for turn in &request.turns {
            match turn.role {
                Role::System => messages.push(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(turn.content.clone())
                        .build()
                        .map_err(build_error)?
                        .into(),
                ),
                Role::Assistant => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.clone())
                        .build()
                        .map_err(build_error)?
                        .into(),
                ),
                Role::User => {
                    let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
                        ChatCompletionRequestMessageContentPartTextArgs::default()
                            .text(turn.content.clone())
                            .build()
                            .map_err(build_error)?
                            .into(),
                    ];
                    if let Some(part) = image_part.take() {
                        parts.push(part);
                    }
                    messages.push(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(parts)
                            .build()
                            .map_err(build_error)?
                            .into(),
                    );
                }
            }
        }

        Ok(messages)
    }
}

#[async_trait]
impl Completion for OpenAILmm {
    #[instrument(skip(self, request), fields(model = %self.model, turns = request.turns.len()))]
    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let messages = self.build_messages(request)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature);
        if request.format == ResponseFormat::Json {
            builder.response_format(OpenAIResponseFormat::JsonObject);
        }
        let chat_request = builder.build().map_err(build_error)?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            SkueError::CompletionUnavailable(format!("OpenAI API error: {}", e))
        })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SkueError::CompletionUnavailable("Empty response from model".to_string()))?
            .clone();

        debug!(
            "Completion response: {}",
            content.chars().take(200).collect::<String>()
        );
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Encode an image as a data URL content part.
fn image_content_part(
    media: &MediaRef,
    detail: &ImageDetail,
) -> Result<ChatCompletionRequestUserMessageContentPart> {
    let url = format!(
        "data:image/{};base64,{}",
        data_url_subtype(&media.extension())?,
        media.encode_base64()?
    );

    let image_url = ImageUrlArgs::default()
        .url(url)
        .detail(detail.clone())
        .build()
        .map_err(build_error)?;

    Ok(ChatCompletionRequestMessageContentPartImageArgs::default()
        .image_url(image_url)
        .build()
        .map_err(build_error)?
        .into())
}

/// MIME subtype for the data URL. Only JPEG and PNG are accepted.
fn data_url_subtype(extension: &str) -> Result<&'static str> {
    match extension {
        "jpg" | "jpeg" => Ok("jpeg"),
        "png" => Ok("png"),
        other => Err(SkueError::Media(format!(
            "Unsupported image extension: .{}",
            other
        ))),
    }
}

fn parse_detail(detail: &str) -> ImageDetail {
    match detail.to_lowercase().as_str() {
        "high" => ImageDetail::High,
        "auto" => ImageDetail::Auto,
        _ => ImageDetail::Low,
    }
}

fn build_error(e: async_openai::error::OpenAIError) -> SkueError {
    SkueError::InvalidInput(format!("Failed to build completion request: {}", e))
}

//! Per-step answers and tool-free answers.

use crate::config::Prompts;
use crate::error::Result;
use crate::lmm::{ChatTurn, Completion, CompletionRequest};
use crate::media::MediaRef;
use crate::workflow::StepResult;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Writes short natural-language answers.
pub struct Narrator {
    lmm: Arc<dyn Completion>,
    prompts: Prompts,
}

impl Narrator {
    pub fn new(lmm: Arc<dyn Completion>, prompts: Prompts) -> Self {
        Self { lmm, prompts }
    }

    /// Answer a step's task from its tool output.
    ///
    /// Never fails: if the completion call does not succeed, the output is
    /// rendered verbatim instead.
    pub async fn narrate(&self, result: &StepResult) -> String {
        let output = serde_json::to_string(&result.output).unwrap_or_default();

        let mut vars = HashMap::new();
        vars.insert("task".to_string(), result.task.clone());
        vars.insert("tool".to_string(), result.tool.clone());
        vars.insert("output".to_string(), output.clone());
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.narrative.step, &vars);

        match self.lmm.generate(&CompletionRequest::prompt(prompt)).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Step {} narrative unavailable: {}", result.index, e);
                format!("{} returned {}", result.tool, output)
            }
        }
    }

    /// Answer without tools, from the conversation and the media.
    pub async fn direct(
        &self,
        query: &str,
        media: Option<&MediaRef>,
        history: &[ChatTurn],
    ) -> Result<String> {
        let mut turns = history.to_vec();
        turns.push(ChatTurn::user(query));

        let request = CompletionRequest {
            turns,
            ..Default::default()
        }
        .with_system(self.prompts.narrative.direct_system.clone())
        .with_media(media);

        let answer = self.lmm.generate(&request).await?;
        debug!("Direct answer of {} chars", answer.len());
        Ok(answer.trim().to_string())
    }
}

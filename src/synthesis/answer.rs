//! Final answer synthesis.

use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::lmm::{Completion, CompletionRequest};
use crate::workflow::Trace;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Produces the final answer from the full trace.
pub struct AnswerSynthesizer {
    lmm: Arc<dyn Completion>,
    prompts: Prompts,
}

impl AnswerSynthesizer {
    pub fn new(lmm: Arc<dyn Completion>, prompts: Prompts) -> Self {
        Self { lmm, prompts }
    }

    /// Answer `query` from the trace.
    ///
    /// Fails with [`SkueError::NoEvidence`] when nothing ran.
    #[instrument(skip(self, trace), fields(steps = trace.len()))]
    pub async fn synthesize(&self, query: &str, trace: &Trace) -> Result<String> {
        if trace.is_empty() {
            return Err(SkueError::NoEvidence);
        }

        let request = CompletionRequest::prompt(self.build_prompt(query, trace))
            .with_system(self.prompts.synthesis.system.clone());
        let answer = self.lmm.generate(&request).await?;
        debug!("Synthesized answer of {} chars", answer.len());

        Ok(answer.trim().to_string())
    }

    /// Render the synthesis prompt. Identical inputs give identical prompts.
    pub fn build_prompt(&self, query: &str, trace: &Trace) -> String {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), query.to_string());
        vars.insert("steps".to_string(), format_steps_for_prompt(trace));

        self.prompts
            .render_with_custom(&self.prompts.synthesis.user, &vars)
    }
}

/// Format every step of the trace, in order, for a prompt.
pub fn format_steps_for_prompt(trace: &Trace) -> String {
    trace
        .iter()
        .map(|r| {
            let mut block = format!(
                "[Step {}] {}\nTool: {}\nStatus: {}\nParameters: {}\nOutput: {}\n",
                r.index,
                r.task,
                r.tool,
                r.status,
                serde_json::to_string(&r.parameters).unwrap_or_default(),
                serde_json::to_string(&r.output).unwrap_or_default(),
            );
            if !r.answer.is_empty() {
                block.push_str(&format!("Answer: {}\n", r.answer));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//! Plan generation through the completion capability.

use super::{Plan, PlanStep, Trace};
use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::lmm::{ChatTurn, Completion, CompletionRequest};
use crate::media::MediaRef;
use crate::tools::ToolRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Extra context for a planning call.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    /// Prior conversation turns, oldest first.
    pub history: &'a [ChatTurn],
    /// Steps already executed; non-empty when replanning.
    pub trace: &'a Trace,
}

/// Turns a query into a validated [`Plan`].
pub struct PlanGenerator {
    lmm: Arc<dyn Completion>,
    prompts: Prompts,
    retry_budget: u32,
}

impl PlanGenerator {
    pub fn new(lmm: Arc<dyn Completion>, prompts: Prompts, retry_budget: u32) -> Self {
        Self {
            lmm,
            prompts,
            retry_budget,
        }
    }

    /// Ask the model for a plan and validate it against the catalog.
    ///
    /// Malformed or invalid plans are retried up to the retry budget with the
    /// problem fed back into the prompt. A completion failure is not retried.
    #[instrument(skip(self, media, registry, context), fields(query = %query))]
    pub async fn generate_plan(
        &self,
        query: &str,
        media: Option<&MediaRef>,
        registry: &ToolRegistry,
        context: &PlanningContext<'_>,
    ) -> Result<Plan> {
        let mut feedback: Option<String> = None;

        for attempt in 0..=self.retry_budget {
            let prompt = self.build_prompt(query, media, registry, context, feedback.as_deref());
            let request = CompletionRequest::prompt(prompt)
                .with_system(self.prompts.planner.system.clone())
                .json();

            let raw = self
                .lmm
                .generate(&request)
                .await
                .map_err(|e| SkueError::Planning(e.to_string()))?;
            debug!("Planner attempt {} returned {} chars", attempt, raw.len());

            match parse_plan(&raw).and_then(|plan| validate_plan(&plan, registry).map(|_| plan)) {
                Ok(plan) => {
                    info!("Planned {} step(s)", plan.len());
                    return Ok(plan);
                }
                Err(problem) => {
                    warn!("Rejected plan (attempt {}): {}", attempt, problem);
                    feedback = Some(problem);
                }
            }
        }

        Err(SkueError::Planning(format!(
            "no valid plan after {} attempt(s): {}",
            self.retry_budget + 1,
            feedback.unwrap_or_default()
        )))
    }

    /// Render the planner's user prompt.
    pub fn build_prompt(
        &self,
        query: &str,
        media: Option<&MediaRef>,
        registry: &ToolRegistry,
        context: &PlanningContext<'_>,
        feedback: Option<&str>,
    ) -> String {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        vars.insert(
            "media".to_string(),
            media
                .map(MediaRef::describe)
                .unwrap_or_else(|| "none".to_string()),
        );
        vars.insert("tools".to_string(), registry.catalog_for_prompt());
        vars.insert("history".to_string(), format_history(context.history));
        vars.insert("trace".to_string(), format_trace(context.trace));
        vars.insert(
            "feedback".to_string(),
            feedback
                .map(|f| format!("\nYour previous plan was rejected: {}\nFix the problem and answer again.\n", f))
                .unwrap_or_default(),
        );
        vars.insert("first_step".to_string(), context.trace.len().to_string());

        self.prompts
            .render_with_custom(&self.prompts.planner.user, &vars)
    }
}

fn format_history(history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nConversation so far:\n");
    for turn in history {
        out.push_str(&format!("{}: {}\n", turn.role, turn.content));
    }
    out
}

fn format_trace(trace: &Trace) -> String {
    if trace.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "\nSteps already run. Their outputs stay available as $step[N]; do not repeat a failed call with the same parameters:\n",
    );
    for result in trace {
        out.push_str(&result.summary_line());
        out.push('\n');
    }
    out
}

/// Extract a plan from a model response.
///
/// Accepts `{"plan": [...]}` or a bare array of steps, optionally wrapped in a
/// markdown code fence.
pub fn parse_plan(raw: &str) -> std::result::Result<Plan, String> {
    let text = strip_code_fence(raw.trim());

    let value: Value = serde_json::from_str(text)
        .or_else(|_| match (text.find(['{', '[']), text.rfind(['}', ']'])) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&text[start..=end]),
            _ => serde_json::from_str(text),
        })
        .map_err(|e| format!("response is not valid JSON: {}", e))?;

    let steps = match value {
        Value::Object(mut map) => map
            .remove("plan")
            .ok_or_else(|| "response has no \"plan\" field".to_string())?,
        array @ Value::Array(_) => array,
        _ => return Err("response must be a JSON object with a \"plan\" array".to_string()),
    };

    let steps: Vec<PlanStep> =
        serde_json::from_value(steps).map_err(|e| format!("malformed plan step: {}", e))?;
    Ok(Plan::new(steps))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Check every step against the tool catalog.
pub fn validate_plan(plan: &Plan, registry: &ToolRegistry) -> std::result::Result<(), String> {
    let mut problems = Vec::new();

    for (i, step) in plan.steps.iter().enumerate() {
        let descriptor = match registry.descriptor(&step.tool) {
            Ok(descriptor) => descriptor,
            Err(_) => {
                problems.push(format!("step {} uses unknown tool '{}'", i, step.tool));
                continue;
            }
        };
        for spec in descriptor.parameters.iter().filter(|p| p.required) {
            if !step.parameters.contains_key(&spec.name) {
                problems.push(format!(
                    "step {} ({}) is missing required parameter '{}'",
                    i, step.tool, spec.name
                ));
            }
        }
        for name in step.parameters.keys() {
            if descriptor.parameter(name).is_none() {
                problems.push(format!(
                    "step {} ({}) has undeclared parameter '{}'",
                    i, step.tool, name
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lmm::ResponseFormat;
    use crate::testing::{counter_registry, FakeLmm};

    fn context(trace: &Trace) -> PlanningContext<'_> {
        PlanningContext { history: &[], trace }
    }

    const VALID: &str = r#"{"plan": [{"task": "count red apples", "tool": "Counter", "parameters": {"prompt": "red apples", "image": "$input"}}]}"#;

    #[test]
    fn test_parse_plan_shapes() {
        assert_eq!(parse_plan(VALID).unwrap().len(), 1);

        let fenced = format!("```json\n{}\n```", VALID);
        assert_eq!(parse_plan(&fenced).unwrap().len(), 1);

        let bare = r#"[{"task": "t", "tool": "Counter", "parameters": {}}]"#;
        assert_eq!(parse_plan(bare).unwrap().len(), 1);

        let chatty = format!("Here is the plan: {} Good luck.", VALID);
        assert_eq!(parse_plan(&chatty).unwrap().len(), 1);

        assert!(parse_plan(r#"{"plan": []}"#).unwrap().is_empty());
        assert!(parse_plan("I cannot help with that").is_err());
        assert!(parse_plan(r#"{"steps": []}"#).is_err());
    }

    #[test]
    fn test_validate_plan() {
        let registry = counter_registry();
        assert!(validate_plan(&parse_plan(VALID).unwrap(), &registry).is_ok());

        let bad = parse_plan(
            r#"{"plan": [
                {"task": "a", "tool": "Segmenter", "parameters": {}},
                {"task": "b", "tool": "Counter", "parameters": {"image": "$input", "colour": "red"}}
            ]}"#,
        )
        .unwrap();
        let problem = validate_plan(&bad, &registry).unwrap_err();
        assert!(problem.contains("unknown tool 'Segmenter'"));
        assert!(problem.contains("missing required parameter 'prompt'"));
        assert!(problem.contains("undeclared parameter 'colour'"));
    }

    #[tokio::test]
    async fn test_generate_plan_requests_json() {
        let lmm = Arc::new(FakeLmm::scripted(vec![VALID]));
        let planner = PlanGenerator::new(lmm.clone(), Prompts::default(), 1);
        let trace = Trace::new();
        let media = MediaRef::image("apples.png");

        let plan = planner
            .generate_plan("How many red apples?", Some(&media), &counter_registry(), &context(&trace))
            .await
            .unwrap();

        assert_eq!(plan.steps[0].tool, "Counter");
        let requests = lmm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].format, ResponseFormat::Json);
        let prompt = requests[0].last_user_content().unwrap();
        assert!(prompt.contains("How many red apples?"));
        assert!(prompt.contains("- Counter:"));
        assert!(prompt.contains("apples.png"));
    }

    #[tokio::test]
    async fn test_invalid_plan_is_retried_with_feedback() {
        let invalid = r#"{"plan": [{"task": "a", "tool": "Segmenter", "parameters": {}}]}"#;
        let lmm = Arc::new(FakeLmm::scripted(vec![invalid, VALID]));
        let planner = PlanGenerator::new(lmm.clone(), Prompts::default(), 1);
        let trace = Trace::new();

        let plan = planner
            .generate_plan("count", None, &counter_registry(), &context(&trace))
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);

        let requests = lmm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1]
            .last_user_content()
            .unwrap()
            .contains("unknown tool 'Segmenter'"));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let lmm = Arc::new(FakeLmm::scripted(vec!["nope", "still nope"]));
        let planner = PlanGenerator::new(lmm.clone(), Prompts::default(), 1);
        let trace = Trace::new();

        let err = planner
            .generate_plan("count", None, &counter_registry(), &context(&trace))
            .await
            .unwrap_err();
        assert!(matches!(err, SkueError::Planning(_)));
        assert_eq!(lmm.calls(), 2);
    }

    #[tokio::test]
    async fn test_completion_failure_is_not_retried() {
        // No scripted replies: the first call fails.
        let lmm = Arc::new(FakeLmm::scripted(vec![]));
        let planner = PlanGenerator::new(lmm.clone(), Prompts::default(), 3);
        let trace = Trace::new();

        let err = planner
            .generate_plan("count", None, &counter_registry(), &context(&trace))
            .await
            .unwrap_err();
        assert!(matches!(err, SkueError::Planning(_)));
        assert_eq!(lmm.calls(), 1);
    }

    #[test]
    fn test_prompt_includes_history() {
        let lmm = Arc::new(FakeLmm::scripted(vec![]));
        let planner = PlanGenerator::new(lmm, Prompts::default(), 0);
        let trace = Trace::new();
        let history = vec![
            ChatTurn::user("How many apples?"),
            ChatTurn::assistant("There are 7 apples."),
        ];
        let context = PlanningContext {
            history: &history,
            trace: &trace,
        };

        let prompt = planner.build_prompt("And pears?", None, &counter_registry(), &context, None);
        assert!(prompt.contains("user: How many apples?"));
        assert!(prompt.contains("assistant: There are 7 apples."));
        assert!(prompt.contains("Media: none"));
        assert!(prompt.contains("will be step 0"));
    }
}

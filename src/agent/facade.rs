//! Agent facade over the workflow engine.

use super::Conversation;
use crate::config::{AgentSettings, Prompts, Settings};
use crate::error::{Result, SkueError};
use crate::lmm::{self, ChatTurn, Completion};
use crate::media::MediaRef;
use crate::tools::ToolRegistry;
use crate::workflow::{Orchestrator, RunControl, Trace, WorkflowOptions, WorkflowOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Caller-facing knobs of the agent.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub verbose: bool,
    pub replan_budget: u32,
    pub plan_retry_budget: u32,
    pub timeout: Option<Duration>,
    pub step_narratives: bool,
    /// Answer without tools when a workflow produced no evidence.
    pub direct_fallback: bool,
    pub max_history_turns: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for AgentOptions {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            verbose: settings.verbose,
            replan_budget: settings.replan_budget,
            plan_retry_budget: settings.plan_retry_budget,
            timeout: settings.timeout_secs.map(Duration::from_secs),
            step_narratives: settings.step_narratives,
            direct_fallback: settings.direct_fallback,
            max_history_turns: settings.max_history_turns,
        }
    }
}

impl AgentOptions {
    fn workflow(&self) -> WorkflowOptions {
        WorkflowOptions {
            replan_budget: self.replan_budget,
            plan_retry_budget: self.plan_retry_budget,
            timeout: self.timeout,
            verbose: self.verbose,
            step_narratives: self.step_narratives,
        }
    }
}

/// An answer together with the run that produced it.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub answer: String,
    pub outcome: WorkflowOutcome,
}

/// Natural-language vision agent.
///
/// Methods take `&self`, so one agent can serve concurrent requests; every
/// call owns its own trace.
pub struct VisionAgent {
    orchestrator: Orchestrator,
    options: AgentOptions,
    model: String,
}

impl VisionAgent {
    pub fn new(
        lmm: Arc<dyn Completion>,
        registry: Arc<ToolRegistry>,
        prompts: Prompts,
        options: AgentOptions,
    ) -> Self {
        let model = lmm.model().to_string();
        Self {
            orchestrator: Orchestrator::new(lmm, registry, prompts, options.workflow()),
            options,
            model,
        }
    }

    /// Build the agent described by the configuration.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let lmm = lmm::from_settings(&settings.lmm)?;
        let registry = Arc::new(ToolRegistry::from_settings(&settings.tools)?);
        info!(
            "Vision agent using {} ({}) with {} tool(s)",
            settings.lmm.provider,
            lmm.model(),
            registry.len()
        );

        Ok(Self::new(
            lmm,
            registry,
            prompts,
            AgentOptions::from(&settings.agent),
        ))
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.orchestrator.registry()
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer a single query.
    pub async fn ask(&self, query: &str, media: Option<&MediaRef>) -> Result<String> {
        let reply = self.run(query, media, &[], &RunControl::new()).await?;
        Ok(reply.answer)
    }

    /// Answer a single query and return the workflow that produced the answer.
    pub async fn ask_with_workflow(
        &self,
        query: &str,
        media: Option<&MediaRef>,
    ) -> Result<(String, Trace)> {
        let reply = self.run(query, media, &[], &RunControl::new()).await?;
        Ok((reply.answer, reply.outcome.trace))
    }

    /// Take one chat turn.
    ///
    /// Returns the answer and the updated conversation. On error the caller's
    /// conversation is unchanged.
    pub async fn chat(
        &self,
        conversation: &Conversation,
        turn: &str,
        media: Option<&MediaRef>,
    ) -> Result<(String, Conversation)> {
        self.chat_with(conversation, turn, media, &RunControl::new())
            .await
    }

    /// [`chat`](Self::chat) with cancellation and progress events.
    pub async fn chat_with(
        &self,
        conversation: &Conversation,
        turn: &str,
        media: Option<&MediaRef>,
        control: &RunControl,
    ) -> Result<(String, Conversation)> {
        let history = conversation.recent(self.options.max_history_turns);
        let reply = self.run(turn, media, history, control).await?;

        let mut updated = conversation.clone();
        updated.turns.push(ChatTurn::user(turn));
        updated.turns.push(ChatTurn::assistant(reply.answer.clone()));
        updated.last_trace = Some(reply.outcome.trace);

        Ok((reply.answer, updated))
    }

    /// Run one full cycle and apply the caller policy for empty traces.
    #[instrument(skip(self, media, history, control), fields(query = %query))]
    pub async fn run(
        &self,
        query: &str,
        media: Option<&MediaRef>,
        history: &[ChatTurn],
        control: &RunControl,
    ) -> Result<AgentReply> {
        if query.trim().is_empty() {
            return Err(SkueError::InvalidInput("Query is empty".to_string()));
        }

        let outcome = self.orchestrator.run(query, media, history, control).await?;
        if let Some(failure) = outcome.failure() {
            return Err(SkueError::Workflow(Box::new(failure)));
        }

        let answer = match &outcome.answer {
            Some(answer) => answer.clone(),
            None if self.options.direct_fallback => {
                info!("No tool evidence, answering directly");
                self.orchestrator
                    .narrator()
                    .direct(query, media, history)
                    .await?
            }
            None => return Err(SkueError::NoEvidence),
        };

        Ok(AgentReply { answer, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lmm::Role;
    use crate::testing::{counter_registry, FakeLmm};

    const COUNT: &str = r#"{"plan": [{"task": "count red apples", "tool": "Counter", "parameters": {"prompt": "red apples", "image": "$input"}}]}"#;
    const CRASH: &str = r#"{"plan": [{"task": "count red apples", "tool": "Counter", "parameters": {"prompt": "crash", "image": "$input"}}]}"#;
    const EMPTY: &str = r#"{"plan": []}"#;

    fn agent(lmm: Arc<FakeLmm>, options: AgentOptions) -> VisionAgent {
        VisionAgent::new(lmm, Arc::new(counter_registry()), Prompts::default(), options)
    }

    fn apples() -> MediaRef {
        MediaRef::image("apples.png")
    }

    #[tokio::test]
    async fn test_ask_counts_apples() {
        let lmm = Arc::new(FakeLmm::routed(vec![COUNT], "There are 7 red apples."));
        let agent = agent(lmm, AgentOptions::default());

        let (answer, trace) = agent
            .ask_with_workflow("How many red apples are in this image?", Some(&apples()))
            .await
            .unwrap();

        assert!(answer.contains('7'));
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.get(0).unwrap().tool, "Counter");
        assert_eq!(trace.get(0).unwrap().output["count"], 7);
    }

    #[tokio::test]
    async fn test_failed_workflow_carries_trace() {
        let lmm = Arc::new(FakeLmm::routed(vec![CRASH], "unused"));
        let options = AgentOptions {
            replan_budget: 0,
            ..Default::default()
        };
        let agent = agent(lmm, options);

        let err = agent.ask("How many?", Some(&apples())).await.unwrap_err();
        assert!(matches!(err, SkueError::Workflow(_)));
        let trace = err.trace().unwrap();
        assert_eq!(trace.len(), 1);
        assert!(trace.last().unwrap().is_failure());
    }

    #[tokio::test]
    async fn test_direct_fallback_for_tool_free_query() {
        let lmm = Arc::new(FakeLmm::routed(vec![EMPTY], "Hello! Send me an image."));
        let agent = agent(lmm.clone(), AgentOptions::default());

        let answer = agent.ask("Hi there", None).await.unwrap();
        assert_eq!(answer, "Hello! Send me an image.");
        assert_eq!(lmm.planner_calls(), 1);
        assert_eq!(lmm.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_evidence_without_fallback() {
        let lmm = Arc::new(FakeLmm::routed(vec![EMPTY], "unused"));
        let options = AgentOptions {
            direct_fallback: false,
            ..Default::default()
        };
        let agent = agent(lmm, options);

        assert!(matches!(
            agent.ask("Hi there", None).await,
            Err(SkueError::NoEvidence)
        ));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let lmm = Arc::new(FakeLmm::routed(vec![], "unused"));
        let agent = agent(lmm.clone(), AgentOptions::default());
        assert!(matches!(
            agent.ask("   ", None).await,
            Err(SkueError::InvalidInput(_))
        ));
        assert_eq!(lmm.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_accumulates_turns() {
        let lmm = Arc::new(FakeLmm::routed(vec![COUNT, COUNT, COUNT], "7 apples"));
        let agent = agent(lmm.clone(), AgentOptions::default());

        let mut conversation = Conversation::new();
        for turn in ["How many apples?", "Are you sure?", "Count again"] {
            let (answer, next) = agent
                .chat(&conversation, turn, Some(&apples()))
                .await
                .unwrap();
            assert_eq!(answer, "7 apples");
            conversation = next;
        }

        assert_eq!(conversation.count(Role::User), 3);
        assert_eq!(conversation.count(Role::Assistant), 3);
        assert_eq!(conversation.last_trace.as_ref().unwrap().len(), 1);

        // The last planning call saw the earlier turns.
        let last_plan = lmm
            .requests()
            .into_iter()
            .filter(|r| r.format == crate::lmm::ResponseFormat::Json)
            .last()
            .unwrap();
        let prompt = last_plan.last_user_content().unwrap().to_string();
        assert!(prompt.contains("user: How many apples?"));
        assert!(prompt.contains("assistant: 7 apples"));
    }

    #[tokio::test]
    async fn test_failed_chat_leaves_conversation() {
        let lmm = Arc::new(FakeLmm::routed(vec![COUNT, CRASH], "7 apples"));
        let options = AgentOptions {
            replan_budget: 0,
            ..Default::default()
        };
        let agent = agent(lmm, options);

        let (_, conversation) = agent
            .chat(&Conversation::new(), "How many apples?", Some(&apples()))
            .await
            .unwrap();
        let before = conversation.clone();

        assert!(agent
            .chat(&conversation, "Again", Some(&apples()))
            .await
            .is_err());
        assert_eq!(conversation, before);
        assert_eq!(conversation.turns.len(), 2);
    }
}

//! The workflow state machine.

use super::binder;
use super::{
    FailureReason, Plan, PlanGenerator, PlanStep, PlanningContext, StepResult, Trace,
    WorkflowEvent, WorkflowOutcome, WorkflowState,
};
use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::lmm::{ChatTurn, Completion};
use crate::media::MediaRef;
use crate::synthesis::{AnswerSynthesizer, Narrator};
use crate::tools::{ToolExecutor, ToolRegistry};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Budgets and switches for a workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// How many times a failed step may trigger a fresh plan.
    pub replan_budget: u32,
    /// How many times an invalid plan is sent back to the planner.
    pub plan_retry_budget: u32,
    /// Wall-clock limit for the whole run.
    pub timeout: Option<Duration>,
    /// Log every step result at info level.
    pub verbose: bool,
    /// Ask the model for a short answer after each successful step.
    pub step_narratives: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            replan_budget: 1,
            plan_retry_budget: 1,
            timeout: None,
            verbose: false,
            step_narratives: true,
        }
    }
}

/// Cancellation and progress reporting for one run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancel: CancellationToken,
    events: Option<UnboundedSender<WorkflowEvent>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<WorkflowEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver just means nobody is watching.
            let _ = events.send(event);
        }
    }
}

enum StepOutcome {
    Ran(StepResult),
    Halted(FailureReason),
}

/// Drives a query from planning to a synthesized answer.
///
/// Steps run one at a time in plan order. A failed step triggers a full
/// re-plan while the replan budget lasts; the trace is kept across plans so
/// step indices stay valid. Cancellation and the timeout are checked between
/// states, never in the middle of a tool or completion call.
pub struct Orchestrator {
    planner: PlanGenerator,
    executor: ToolExecutor,
    registry: Arc<ToolRegistry>,
    narrator: Narrator,
    synthesizer: AnswerSynthesizer,
    options: WorkflowOptions,
}

impl Orchestrator {
    pub fn new(
        lmm: Arc<dyn Completion>,
        registry: Arc<ToolRegistry>,
        prompts: Prompts,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            planner: PlanGenerator::new(lmm.clone(), prompts.clone(), options.plan_retry_budget),
            executor: ToolExecutor::new(registry.clone()),
            registry,
            narrator: Narrator::new(lmm.clone(), prompts.clone()),
            synthesizer: AnswerSynthesizer::new(lmm, prompts),
            options,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    /// Run one query to a terminal state.
    ///
    /// A FAILED run is still an `Ok` outcome carrying the partial trace; `Err`
    /// is reserved for internal faults.
    #[instrument(skip(self, media, history, control), fields(query = %query))]
    pub async fn run(
        &self,
        query: &str,
        media: Option<&MediaRef>,
        history: &[ChatTurn],
        control: &RunControl,
    ) -> Result<WorkflowOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        info!("Starting workflow {}", run_id);

        let mut trace = Trace::new();
        let mut plans: Vec<Plan> = Vec::new();
        let mut plan = Plan::default();
        let mut cursor = 0;
        let mut replans_used = 0;
        let mut answer = None;
        let mut state = WorkflowState::Planning;

        while !state.is_terminal() {
            if let Some(reason) = interruption(control, deadline) {
                warn!("Workflow {} interrupted: {}", run_id, reason);
                state = WorkflowState::Failed { reason };
                break;
            }
            control.emit(WorkflowEvent::StateChanged {
                state: state.clone(),
            });
            debug!("Workflow {} is {}", run_id, state);

            state = match &state {
                WorkflowState::Planning | WorkflowState::Replanning => {
                    let replan = matches!(state, WorkflowState::Replanning);
                    let context = PlanningContext {
                        history,
                        trace: &trace,
                    };
                    match self
                        .planner
                        .generate_plan(query, media, &self.registry, &context)
                        .await
                    {
                        Ok(next) => {
                            control.emit(WorkflowEvent::PlanReady {
                                plan: next.clone(),
                                replan,
                            });
                            plans.push(next.clone());
                            plan = next;
                            cursor = 0;
                            if plan.is_empty() {
                                WorkflowState::Done
                            } else {
                                WorkflowState::Executing { step: trace.len() }
                            }
                        }
                        Err(e) => WorkflowState::Failed {
                            reason: FailureReason::Unplannable {
                                message: e.to_string(),
                            },
                        },
                    }
                }

                WorkflowState::Executing { step } => {
                    let step = *step;
                    let Some(planned) = plan.steps.get(cursor) else {
                        return Err(SkueError::InvalidInput(format!(
                            "plan cursor {} is past the end of the plan",
                            cursor
                        )));
                    };

                    match self.run_step(planned, step, &trace, media).await? {
                        StepOutcome::Halted(reason) => WorkflowState::Failed { reason },
                        StepOutcome::Ran(result) => {
                            if self.options.verbose {
                                info!("{}", result.summary_line());
                            }
                            control.emit(WorkflowEvent::StepFinished {
                                result: result.clone(),
                            });

                            let failure = result.is_failure().then(|| result.answer.clone());
                            trace.push(result)?;

                            match failure {
                                Some(_) if replans_used < self.options.replan_budget => {
                                    replans_used += 1;
                                    info!(
                                        "Step {} failed, replanning ({}/{})",
                                        step, replans_used, self.options.replan_budget
                                    );
                                    WorkflowState::Replanning
                                }
                                Some(error) => WorkflowState::Failed {
                                    reason: FailureReason::ReplanBudgetExhausted { step, error },
                                },
                                None => {
                                    cursor += 1;
                                    if cursor < plan.len() {
                                        WorkflowState::Executing { step: step + 1 }
                                    } else {
                                        WorkflowState::Done
                                    }
                                }
                            }
                        }
                    }
                }

                WorkflowState::Done | WorkflowState::Failed { .. } => break,
            };
        }

        if state == WorkflowState::Done {
            if let Some(reason) = interruption(control, deadline) {
                state = WorkflowState::Failed { reason };
            } else if !trace.is_empty() {
                match self.synthesizer.synthesize(query, &trace).await {
                    Ok(text) => answer = Some(text),
                    Err(SkueError::NoEvidence) => {}
                    Err(e) => {
                        state = WorkflowState::Failed {
                            reason: FailureReason::SynthesisUnavailable {
                                message: e.to_string(),
                            },
                        }
                    }
                }
            }
        }

        control.emit(WorkflowEvent::StateChanged {
            state: state.clone(),
        });
        info!(
            "Workflow {} finished ({}) after {} step(s) and {} replan(s)",
            run_id,
            state,
            trace.len(),
            replans_used
        );

        Ok(WorkflowOutcome {
            run_id,
            started_at,
            finished_at: Utc::now(),
            state,
            trace,
            plans,
            replans_used,
            answer,
        })
    }

    /// Bind, execute and narrate a single step.
    async fn run_step(
        &self,
        planned: &PlanStep,
        index: usize,
        trace: &Trace,
        media: Option<&MediaRef>,
    ) -> Result<StepOutcome> {
        let resolved = match binder::resolve(planned, index, trace, media) {
            Ok(resolved) => resolved,
            Err(SkueError::DanglingReference { step, reason }) => {
                return Ok(StepOutcome::Halted(FailureReason::DanglingReference {
                    step,
                    message: reason,
                }))
            }
            Err(e) => return Err(e),
        };

        let mut result = match self.executor.execute(&resolved).await {
            Ok(result) => result,
            Err(SkueError::UnknownTool(tool)) => {
                return Ok(StepOutcome::Halted(FailureReason::UnknownTool { tool }))
            }
            Err(e) => return Err(e),
        };

        if self.options.step_narratives && !result.is_failure() {
            result.answer = self.narrator.narrate(&result).await;
        }

        Ok(StepOutcome::Ran(result))
    }
}

fn interruption(control: &RunControl, deadline: Option<Instant>) -> Option<FailureReason> {
    if control.cancel.is_cancelled() {
        return Some(FailureReason::Cancelled { timed_out: false });
    }
    match deadline {
        Some(deadline) if Instant::now() >= deadline => {
            Some(FailureReason::Cancelled { timed_out: true })
        }
        _ => None,
    }
}

//! Plan, bind, execute and trace.
//!
//! A query flows through the [`Orchestrator`] state machine:
//!
//! ```text
//! PLANNING -> EXECUTING(i) -> { EXECUTING(i+1), REPLANNING, DONE, FAILED }
//! ```
//!
//! The [`Trace`] built along the way is the workflow artifact: it can be
//! returned to the caller, saved as JSON and inspected afterwards.

pub mod binder;
mod orchestrator;
mod plan;
mod planner;
mod trace;

pub use orchestrator::{Orchestrator, RunControl, WorkflowOptions};
pub use plan::{Plan, PlanStep, ResolvedStep};
pub use planner::{parse_plan, validate_plan, PlanGenerator, PlanningContext};
pub use trace::{StepResult, StepStatus, Trace};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Where the orchestrator currently is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Planning,
    /// About to run the step that will take trace position `step`.
    Executing { step: usize },
    Replanning,
    Done,
    Failed { reason: FailureReason },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Failed { .. })
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::Planning => write!(f, "planning"),
            WorkflowState::Executing { step } => write!(f, "executing step {}", step),
            WorkflowState::Replanning => write!(f, "replanning"),
            WorkflowState::Done => write!(f, "done"),
            WorkflowState::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Why a workflow ended in FAILED.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Unplannable { message: String },
    DanglingReference { step: usize, message: String },
    UnknownTool { tool: String },
    ReplanBudgetExhausted { step: usize, error: String },
    Cancelled { timed_out: bool },
    SynthesisUnavailable { message: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Unplannable { message } => write!(f, "unplannable query: {}", message),
            FailureReason::DanglingReference { step, message } => {
                write!(f, "dangling reference in step {}: {}", step, message)
            }
            FailureReason::UnknownTool { tool } => write!(f, "unknown tool: {}", tool),
            FailureReason::ReplanBudgetExhausted { step, error } => write!(
                f,
                "step {} failed and the replan budget is exhausted: {}",
                step, error
            ),
            FailureReason::Cancelled { timed_out: true } => write!(f, "timed out"),
            FailureReason::Cancelled { timed_out: false } => write!(f, "cancelled"),
            FailureReason::SynthesisUnavailable { message } => {
                write!(f, "answer synthesis unavailable: {}", message)
            }
        }
    }
}

/// A failed workflow, with everything that ran before the failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowFailure {
    pub reason: FailureReason,
    pub trace: Trace,
}

impl std::fmt::Display for WorkflowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} step(s) ran)", self.reason, self.trace.len())
    }
}

/// Record of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Terminal state: `Done` or `Failed`.
    pub state: WorkflowState,
    pub trace: Trace,
    /// Every plan produced, the initial one first.
    pub plans: Vec<Plan>,
    pub replans_used: u32,
    /// Synthesized answer; `None` when there was no evidence to answer from.
    pub answer: Option<String>,
}

impl WorkflowOutcome {
    pub fn is_done(&self) -> bool {
        self.state == WorkflowState::Done
    }

    /// Split into the failure, if the run did not reach DONE.
    pub fn failure(&self) -> Option<WorkflowFailure> {
        match &self.state {
            WorkflowState::Failed { reason } => Some(WorkflowFailure {
                reason: reason.clone(),
                trace: self.trace.clone(),
            }),
            _ => None,
        }
    }
}

/// Progress notifications emitted while a workflow runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StateChanged { state: WorkflowState },
    PlanReady { plan: Plan, replan: bool },
    StepFinished { result: StepResult },
}

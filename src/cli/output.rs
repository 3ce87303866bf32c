//! CLI output formatting utilities.

use crate::workflow::{Plan, StepResult, StepStatus, WorkflowEvent};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a plan as it arrives.
    pub fn plan(plan: &Plan, first_step: usize, replan: bool) {
        let label = if replan { "Revised plan" } else { "Plan" };
        println!("{} {} ({} step(s))", style(">>").cyan().bold(), label, plan.len());
        for (offset, step) in plan.steps.iter().enumerate() {
            println!(
                "   {} {} {}",
                style(format!("[{}]", first_step + offset)).dim(),
                style(&step.tool).bold(),
                step.task
            );
        }
    }

    /// Print one executed step.
    pub fn step_result(result: &StepResult) {
        let marker = match result.status {
            StepStatus::Success => style("ok").green(),
            StepStatus::Partial => style("partial").yellow(),
            StepStatus::Failure => style("failed").red(),
        };
        println!(
            "  {} {} {}",
            style(format!("[{}]", result.index)).dim(),
            style(&result.tool).bold(),
            marker
        );
        println!(
            "     {}",
            content_preview(&serde_json::to_string(&result.output).unwrap_or_default(), 200)
        );
        if !result.answer.is_empty() {
            println!("     {}", style(content_preview(&result.answer, 200)).dim());
        }
    }

    /// Render a live workflow event.
    pub fn event(event: &WorkflowEvent, next_step: usize) {
        match event {
            WorkflowEvent::PlanReady { plan, replan } => Self::plan(plan, next_step, *replan),
            WorkflowEvent::StepFinished { result } => Self::step_result(result),
            WorkflowEvent::StateChanged { .. } => {}
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_len: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_len {
        content
    } else {
        let cut: String = content.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}

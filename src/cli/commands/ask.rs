//! Ask command implementation.

use super::{cancel_on_ctrl_c, live_workflow, parse_media};
use crate::agent::VisionAgent;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::workflow::{RunControl, Trace};
use anyhow::Result;
use std::path::PathBuf;

/// Run the ask command.
///
/// `save_trace` is `Some("")` when `--save-trace` is given without a path;
/// the trace then goes to the workflows directory.
pub async fn run_ask(
    query: &str,
    media: Option<&str>,
    workflow: bool,
    save_trace: Option<&str>,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings.lmm) {
        Output::error(&format!("{}", e));
        Output::info("Run 'skue doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let media = parse_media(media)?;
    let agent = VisionAgent::from_settings(&settings)?;
    let cancel = cancel_on_ctrl_c();

    let result = if workflow {
        let (control, printer) = live_workflow(cancel);
        let result = agent.run(query, media.as_ref(), &[], &control).await;
        // Closing the channel lets the printer drain and exit.
        drop(control);
        let _ = printer.await;
        result
    } else {
        let spinner = Output::spinner("Planning and running tools...");
        let control = RunControl::new().with_cancel(cancel);
        let result = agent.run(query, media.as_ref(), &[], &control).await;
        spinner.finish_and_clear();
        result
    };

    match result {
        Ok(reply) => {
            println!("\n{}\n", reply.answer);
            if let Some(target) = save_trace {
                save(&reply.outcome.trace, target, &settings)?;
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to answer: {}", e));
            if let (Some(trace), Some(target)) = (e.trace(), save_trace) {
                save(trace, target, &settings)?;
            }
            Err(e.into())
        }
    }
}

fn save(trace: &Trace, target: &str, settings: &Settings) -> Result<()> {
    let path = if target.is_empty() {
        let dir = settings.workflows_dir();
        std::fs::create_dir_all(&dir)?;
        dir.join(format!(
            "workflow-{}.json",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        ))
    } else {
        PathBuf::from(target)
    };

    std::fs::write(&path, trace.to_json()?)?;
    Output::success(&format!(
        "Saved workflow with {} step(s) to {}",
        trace.len(),
        path.display()
    ));
    Ok(())
}

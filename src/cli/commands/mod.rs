//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod serve;
mod tools;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use serve::run_serve;
pub use tools::run_tools;

use crate::cli::Output;
use crate::config::Settings;
use crate::error::{Result, SkueError};
use crate::media::MediaRef;
use crate::workflow::{RunControl, WorkflowEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Parse the `--media` argument.
fn parse_media(media: Option<&str>) -> Result<Option<MediaRef>> {
    media
        .map(|path| {
            let media = MediaRef::from_path(Settings::expand_path(path))?;
            if !media.path.exists() {
                return Err(SkueError::Media(format!(
                    "File not found: {}",
                    media.path.display()
                )));
            }
            Ok(media)
        })
        .transpose()
}

/// Cancel the token on Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            Output::warning("Cancelling after the current step...");
            child.cancel();
        }
    });
    token
}

/// Run control that prints plans and steps live.
fn live_workflow(cancel: CancellationToken) -> (RunControl, JoinHandle<()>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let control = RunControl::new().with_cancel(cancel).with_events(tx);
    (control, tokio::spawn(print_events(rx)))
}

async fn print_events(mut rx: UnboundedReceiver<WorkflowEvent>) {
    let mut next_step = 0;
    while let Some(event) = rx.recv().await {
        Output::event(&event, next_step);
        if matches!(event, WorkflowEvent::StepFinished { .. }) {
            next_step += 1;
        }
    }
}

//! Interactive chat command.

use super::{live_workflow, parse_media};
use crate::agent::{Conversation, VisionAgent};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use tokio_util::sync::CancellationToken;

/// Run the interactive chat command.
pub async fn run_chat(media: Option<&str>, settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings.lmm) {
        Output::error(&format!("{}", e));
        Output::info("Run 'skue doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let mut media = parse_media(media)?;
    let agent = VisionAgent::from_settings(&settings)?;
    let mut conversation = Conversation::new();

    println!("\n{}", style("Skue Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask about your media, or 'exit' to quit. Commands: 'clear', 'trace', 'media <path>'.").dim()
    );
    if let Some(media) = &media {
        Output::kv("Media", &media.path_str());
        println!();
    }

    let stdin = io::stdin();

    loop {
        print!("{} ", style("You:").green().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            conversation = Conversation::new();
            Output::info("Conversation history cleared.");
            continue;
        }

        if input.eq_ignore_ascii_case("trace") {
            match &conversation.last_trace {
                Some(trace) if !trace.is_empty() => {
                    for result in trace {
                        Output::step_result(result);
                    }
                }
                _ => Output::info("No tools have run yet."),
            }
            continue;
        }

        if let Some(path) = input.strip_prefix("media ") {
            match parse_media(Some(path.trim())) {
                Ok(next) => {
                    media = next;
                    Output::success(&format!("Now discussing {}", path.trim()));
                }
                Err(e) => Output::error(&e.to_string()),
            }
            continue;
        }

        let cancel = CancellationToken::new();
        let (control, printer) = live_workflow(cancel.clone());
        let result = {
            let turn = agent.chat_with(&conversation, input, media.as_ref(), &control);
            tokio::pin!(turn);
            tokio::select! {
                result = &mut turn => result,
                _ = tokio::signal::ctrl_c() => {
                    Output::warning("Cancelling after the current step...");
                    cancel.cancel();
                    turn.await
                }
            }
        };
        drop(control);
        let _ = printer.await;

        match result {
            Ok((answer, next)) => {
                conversation = next;
                println!("\n{} {}\n", style("Skue:").cyan().bold(), answer);
            }
            Err(e) => {
                Output::error(&format!("{}", e));
                println!();
            }
        }
    }

    println!("\n{}", style("Goodbye!").dim());
    Ok(())
}

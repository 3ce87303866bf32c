//! CLI module for Skue.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Skue - natural-language vision task agent
///
/// Ask questions about images and videos. Skue plans a workflow of vision
/// tools, runs it step by step and answers from the results.
#[derive(Parser, Debug)]
#[command(name = "skue")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the model backend, tools and configuration
    Doctor,

    /// Ask a question about an image or video
    Ask {
        /// The question to ask
        query: String,

        /// Image or video the question is about
        #[arg(short, long)]
        media: Option<String>,

        /// Print every plan and step as the workflow runs
        #[arg(short, long)]
        workflow: bool,

        /// Write the workflow trace to this JSON file (workflows directory when no path is given)
        #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
        save_trace: Option<String>,
    },

    /// Start an interactive chat session
    Chat {
        /// Image or video the conversation is about
        #[arg(short, long)]
        media: Option<String>,
    },

    /// List the configured tools
    Tools,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn save_trace(args: &[&str]) -> Option<String> {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Ask { save_trace, .. } => save_trace,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_save_trace_without_path() {
        assert_eq!(
            save_trace(&["skue", "ask", "how many apples?", "--save-trace"]),
            Some(String::new())
        );
    }

    #[test]
    fn test_save_trace_with_path() {
        assert_eq!(
            save_trace(&["skue", "ask", "how many apples?", "--save-trace", "run.json"]),
            Some("run.json".to_string())
        );
        assert_eq!(save_trace(&["skue", "ask", "how many apples?"]), None);
    }

    #[test]
    fn test_save_trace_before_query() {
        assert_eq!(
            save_trace(&["skue", "ask", "--save-trace", "--workflow", "how many apples?"]),
            Some(String::new())
        );
    }
}

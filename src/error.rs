//! Error types for Skue.

use crate::workflow::WorkflowFailure;
use thiserror::Error;

/// Library-level error type for Skue operations.
#[derive(Error, Debug)]
pub enum SkueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Dangling reference in step {step}: {reason}")]
    DanglingReference { step: usize, reason: String },

    #[error("No evidence to synthesize an answer from")]
    NoEvidence,

    #[error("Completion service unavailable: {0}")]
    CompletionUnavailable(String),

    #[error("Workflow failed: {0}")]
    Workflow(Box<WorkflowFailure>),

    #[error("Media error: {0}")]
    Media(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SkueError {
    /// The partial trace attached to a failed workflow, if any.
    pub fn trace(&self) -> Option<&crate::workflow::Trace> {
        match self {
            SkueError::Workflow(failure) => Some(&failure.trace),
            _ => None,
        }
    }
}

/// Result type alias for Skue operations.
pub type Result<T> = std::result::Result<T, SkueError>;

//! Pre-flight checks before talking to a model.
//!
//! Validates that the configured completion backend is reachable in
//! principle before starting a workflow that would otherwise fail midway.

use crate::config::{LmmProvider, LmmSettings};
use crate::error::{Result, SkueError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering queries requires a configured model.
    Ask,
    /// Serving the HTTP API has the same requirements as asking.
    Serve,
    /// Listing tools needs nothing beyond the config file.
    Tools,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, lmm: &LmmSettings) -> Result<()> {
    match operation {
        Operation::Ask | Operation::Serve => check_lmm(lmm),
        Operation::Tools => Ok(()),
    }
}

fn check_lmm(lmm: &LmmSettings) -> Result<()> {
    match lmm.provider {
        LmmProvider::OpenAI => check_api_key(),
        LmmProvider::Llava => check_endpoint(&lmm.llava_endpoint),
    }
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SkueError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(SkueError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

/// Check that the LLaVA endpoint is a usable URL.
fn check_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.is_empty() {
        return Err(SkueError::Config(
            "lmm.llava_endpoint is not set. Set it with: skue config edit".to_string(),
        ));
    }
    url::Url::parse(endpoint)
        .map(|_| ())
        .map_err(|e| SkueError::Config(format!("Invalid lmm.llava_endpoint '{}': {}", endpoint, e)))
}

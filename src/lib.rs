//! Skue - natural-language vision task agent
//!
//! Ask a question about an image or video in plain language. Skue plans a
//! sequence of vision tool calls, runs them one by one while threading
//! earlier outputs into later steps, and answers from the results.
//!
//! # Overview
//!
//! - A [`tools::ToolRegistry`] holds the contracts of the available tools
//! - A planner asks a multimodal model for a [`workflow::Plan`]
//! - The orchestrator binds `$input` / `$step[i].field` references, executes
//!   each step and records a [`workflow::Trace`]
//! - A failed step triggers a bounded re-plan
//! - The final answer is synthesized from the trace
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `lmm` - Completion backends (OpenAI, LLaVA)
//! - `media` - Image and video references
//! - `tools` - Tool contracts, registry and executor
//! - `workflow` - Planning, binding, orchestration and the trace
//! - `synthesis` - Per-step narratives and final answers
//! - `agent` - The `ask` / `ask_with_workflow` / `chat` facade
//!
//! # Example
//!
//! ```rust,no_run
//! use skue::agent::VisionAgent;
//! use skue::config::Settings;
//! use skue::media::MediaRef;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let agent = VisionAgent::from_settings(&settings)?;
//!
//!     let media = MediaRef::from_path("apples.png")?;
//!     let (answer, trace) = agent
//!         .ask_with_workflow("How many red apples are there?", Some(&media))
//!         .await?;
//!     println!("{} ({} steps)", answer, trace.len());
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod lmm;
pub mod media;
pub mod openai;
pub mod synthesis;
pub mod tools;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use error::{Result, SkueError};

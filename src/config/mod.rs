//! Configuration module for Skue.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{NarrativePrompts, PlannerPrompts, Prompts, SynthesisPrompts};
pub use settings::{
    AgentSettings, GeneralSettings, LmmProvider, LmmSettings, PromptSettings, Settings,
    ToolSettings,
};

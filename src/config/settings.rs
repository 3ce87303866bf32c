//! Configuration settings for Skue.

use crate::tools::{FieldSpec, ParamSpec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub lmm: LmmSettings,
    pub agent: AgentSettings,
    pub prompts: PromptSettings,
    /// Remote tools exposed to the planner.
    pub tools: Vec<ToolSettings>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data (saved workflows).
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.skue".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Completion backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LmmProvider {
    /// OpenAI chat completions with image input.
    #[default]
    OpenAI,
    /// Hosted LLaVA endpoint.
    Llava,
}

impl std::str::FromStr for LmmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LmmProvider::OpenAI),
            "llava" => Ok(LmmProvider::Llava),
            _ => Err(format!(
                "Unknown LMM: {}, currently supported: openai, llava",
                s
            )),
        }
    }
}

impl std::fmt::Display for LmmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LmmProvider::OpenAI => write!(f, "openai"),
            LmmProvider::Llava => write!(f, "llava"),
        }
    }
}

/// Completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LmmSettings {
    /// Backend (openai, llava).
    pub provider: LmmProvider,
    /// Model name passed to the backend.
    pub model: String,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Image detail level for OpenAI vision input (low, high, auto).
    pub image_detail: String,
    /// Endpoint for the LLaVA provider.
    pub llava_endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LmmSettings {
    fn default() -> Self {
        Self {
            provider: LmmProvider::OpenAI,
            model: "gpt-4o".to_string(),
            max_tokens: 1024,
            temperature: 0.1,
            image_detail: "low".to_string(),
            llava_endpoint: String::new(),
            timeout_secs: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Workflow engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum re-plans after a failed tool call.
    pub replan_budget: u32,
    /// Maximum retries when the planner returns a structurally invalid plan.
    pub plan_retry_budget: u32,
    /// Overall wall-clock budget per workflow in seconds (none = unbounded).
    pub timeout_secs: Option<u64>,
    /// Emit every step result as it is produced.
    pub verbose: bool,
    /// Ask the completion service for a short answer after each step.
    pub step_narratives: bool,
    /// Answer directly without tools when a workflow produced no evidence.
    pub direct_fallback: bool,
    /// Prior chat turns included as planning context.
    pub max_history_turns: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            replan_budget: 1,
            plan_retry_budget: 1,
            timeout_secs: None,
            verbose: false,
            step_narratives: true,
            direct_fallback: true,
            max_history_turns: 10,
        }
    }
}

/// A remote tool declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Unique tool name shown to the planner.
    pub name: String,
    /// What the tool does and when to use it.
    pub description: String,
    /// HTTP endpoint receiving `{"parameters": {...}}`.
    pub endpoint: String,
    /// Parameter schema.
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
    /// Declared result fields.
    #[serde(default)]
    pub returns: Vec<FieldSpec>,
    /// Per-call timeout in seconds.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

fn default_tool_timeout() -> u64 {
    120
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SkueError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skue")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Directory where saved workflows are written.
    pub fn workflows_dir(&self) -> PathBuf {
        self.data_dir().join("workflows")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ParamKind;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.agent.replan_budget, 1);
        assert_eq!(settings.agent.plan_retry_budget, 1);
        assert_eq!(settings.lmm.provider, LmmProvider::OpenAI);
        assert!(settings.tools.is_empty());
    }

    #[test]
    fn test_parse_tools_section() {
        let toml_str = r#"
[agent]
replan_budget = 0

[[tools]]
name = "Counter"
description = "Counts objects matching a prompt"
endpoint = "http://localhost:8000/count"
parameters = [
    { name = "prompt", kind = "string" },
    { name = "image", kind = "image" },
]
returns = [{ name = "count", kind = "integer" }]
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.agent.replan_budget, 0);
        assert_eq!(settings.agent.plan_retry_budget, 1);
        assert_eq!(settings.tools.len(), 1);

        let tool = &settings.tools[0];
        assert_eq!(tool.parameters[1].kind, ParamKind::Image);
        assert!(tool.parameters[0].required);
        assert_eq!(tool.timeout_secs, 120);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.lmm.provider = LmmProvider::Llava;
        settings.agent.timeout_secs = Some(30);
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.lmm.provider, LmmProvider::Llava);
        assert_eq!(loaded.agent.timeout_secs, Some(30));
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<LmmProvider>().unwrap(), LmmProvider::OpenAI);
        assert!("gemini".parse::<LmmProvider>().is_err());
    }
}

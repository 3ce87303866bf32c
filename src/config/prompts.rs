//! Prompt templates for Skue.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub planner: PlannerPrompts,
    pub synthesis: SynthesisPrompts,
    /// Prompts for the per-step narrative and the tool-free fallback.
    pub narrative: NarrativePrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for plan generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerPrompts {
    pub system: String,
    pub user: String,
}

impl Default for PlannerPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a planner for a computer vision agent. You break a user's request about an image or video into an ordered list of tool calls.

Rules:
- Only use tools from the catalog, with their exact names
- Provide every required parameter; never invent parameters that are not listed
- Steps run strictly in order; a step may only use outputs of earlier steps
- To use the user's media, pass the string "$input"
- To use an earlier step's output, pass the string "$step[N].field" where N is the step number shown to you and field is one of that tool's result fields ("$step[N]" passes the whole output)
- If the request needs no tools, return an empty plan

Respond with JSON only."#
                .to_string(),

            user: r#"Request: {{query}}

Media: {{media}}

Available tools:
{{tools}}
{{history}}{{trace}}{{feedback}}
Return a JSON object of the form:
{"plan": [{"task": "what this step achieves", "tool": "ToolName", "parameters": {"name": "value"}}]}

The first step of your plan will be step {{first_step}}."#
                .to_string(),
        }
    }
}

/// Prompts for final answer synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SynthesisPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a helpful vision assistant. You answer the user's question using only the results of the tool calls that were run on their media.

Guidelines:
- Ground every claim in a tool result and mention which step it came from, e.g. (step 0)
- Report numbers exactly as the tools returned them
- If a step failed, say what could not be determined
- Be concise"#
                .to_string(),

            user: r#"Question: {{question}}

Tool results, in execution order:

{{steps}}

Answer the question based on the above results."#
                .to_string(),
        }
    }
}

/// Prompts for per-step answers and tool-free answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativePrompts {
    pub step: String,
    pub direct_system: String,
}

impl Default for NarrativePrompts {
    fn default() -> Self {
        Self {
            step: r#"A tool was called to accomplish this task: {{task}}

Tool: {{tool}}
Output:
{{output}}

In one or two sentences, state what the output tells us about the task. Use only the output."#
                .to_string(),

            direct_system: r#"You are a helpful vision assistant. No tools were needed for this request, so answer directly from the conversation and any attached media. If you cannot tell, say so."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let planner_path = custom_path.join("planner.toml");
            if planner_path.exists() {
                let content = std::fs::read_to_string(&planner_path)?;
                prompts.planner = toml::from_str(&content)?;
            }

            let synthesis_path = custom_path.join("synthesis.toml");
            if synthesis_path.exists() {
                let content = std::fs::read_to_string(&synthesis_path)?;
                prompts.synthesis = toml::from_str(&content)?;
            }

            let narrative_path = custom_path.join("narrative.toml");
            if narrative_path.exists() {
                let content = std::fs::read_to_string(&narrative_path)?;
                prompts.narrative = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are replaced in a single pass: substituted values are
    /// never scanned again, and unknown placeholders are left as written.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        placeholder_pattern()
            .replace_all(template, |captures: &regex::Captures<'_>| {
                match vars.get(&captures[1]) {
                    Some(value) => value.clone(),
                    None => captures[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid placeholder regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.planner.system.is_empty());
        assert!(prompts.planner.user.contains("{{tools}}"));
        assert!(prompts.synthesis.user.contains("{{steps}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "what does {{tools}} mean?".to_string());
        vars.insert("tools".to_string(), "Counter".to_string());

        let result = Prompts::render("Tools: {{tools}}\nQuestion: {{query}} {{unknown}}", &vars);
        assert_eq!(result, "Tools: Counter\nQuestion: what does {{tools}} mean? {{unknown}}");
    }

    #[test]
    fn test_render_with_custom_prefers_provided() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("name".to_string(), "config".to_string());
        prompts.variables.insert("team".to_string(), "vision".to_string());

        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "call".to_string());

        let result = prompts.render_with_custom("{{name}}/{{team}}", &vars);
        assert_eq!(result, "call/vision");
    }

    #[test]
    fn test_load_custom_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("synthesis.toml"),
            "system = \"custom system\"\nuser = \"{{question}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.synthesis.system, "custom system");
        assert!(!prompts.planner.system.is_empty());
    }
}

//! Doctor command - verify the model backend, tools and configuration.

use crate::cli::Output;
use crate::config::{LmmProvider, Settings};
use crate::tools::ToolRegistry;
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Skue Doctor");
    println!();
    println!("Checking model backend, tools and configuration...\n");

    let mut checks = Vec::new();

    let sections = [
        ("Model Backend", check_lmm(settings)),
        ("Tools", check_tools(settings)),
        ("Directories", check_directories(settings)),
        ("Configuration", check_config(settings)),
    ];

    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    }

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Skue.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! Skue is ready to use.");
    }

    Ok(())
}

/// Check the configured completion backend.
fn check_lmm(settings: &Settings) -> Vec<CheckResult> {
    let lmm = &settings.lmm;
    let mut results = vec![CheckResult::ok(
        "Provider",
        &format!("{} ({})", lmm.provider, lmm.model),
    )];

    results.push(match lmm.provider {
        LmmProvider::OpenAI => check_openai_api_key(),
        LmmProvider::Llava => check_llava_endpoint(&lmm.llava_endpoint),
    });

    results
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key() -> CheckResult {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Ok(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

fn check_llava_endpoint(endpoint: &str) -> CheckResult {
    if endpoint.is_empty() {
        return CheckResult::error(
            "LLaVA endpoint",
            "not set",
            "Set lmm.llava_endpoint with: skue config edit",
        );
    }
    match url::Url::parse(endpoint) {
        Ok(_) => CheckResult::ok("LLaVA endpoint", endpoint),
        Err(e) => CheckResult::error(
            "LLaVA endpoint",
            &format!("invalid URL: {}", e),
            "Expected something like https://host/generate",
        ),
    }
}

/// Check the tool catalog.
fn check_tools(settings: &Settings) -> Vec<CheckResult> {
    match ToolRegistry::from_settings(&settings.tools) {
        Ok(registry) if registry.is_empty() => vec![CheckResult::warning(
            "Catalog",
            "no tools configured",
            "Declare tools under [[tools]]; without them every query is answered directly",
        )],
        Ok(registry) => registry
            .describe_all()
            .iter()
            .map(|d| {
                CheckResult::ok(
                    &d.name,
                    &format!("{} parameter(s), {} result field(s)", d.parameters.len(), d.returns.len()),
                )
            })
            .collect(),
        Err(e) => vec![CheckResult::error(
            "Catalog",
            &e.to_string(),
            "Fix the [[tools]] entries with: skue config edit",
        )],
    }
}

/// Check data directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for (name, dir) in [
        ("Data directory", settings.data_dir()),
        ("Workflows", settings.workflows_dir()),
    ] {
        if dir.exists() {
            results.push(CheckResult::ok(name, &format!("{}", dir.display())));
        } else {
            results.push(CheckResult::warning(
                name,
                &format!("{} (will be created)", dir.display()),
                "Directory will be created on first use",
            ));
        }
    }

    results
}

/// Check the config file and custom prompts.
fn check_config(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        results.push(CheckResult::ok("Config file", &format!("{}", config_path.display())));
    } else {
        results.push(CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: skue config edit",
        ));
    }

    if let Some(dir) = &settings.prompts.custom_dir {
        let path = Settings::expand_path(dir);
        if path.is_dir() {
            results.push(CheckResult::ok("Custom prompts", &format!("{}", path.display())));
        } else {
            results.push(CheckResult::warning(
                "Custom prompts",
                &format!("{} does not exist", path.display()),
                "Built-in prompts are used instead",
            ));
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolSettings;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_check_llava_endpoint() {
        assert_eq!(check_llava_endpoint("").status, CheckStatus::Error);
        assert_eq!(check_llava_endpoint("nope").status, CheckStatus::Error);
        assert_eq!(
            check_llava_endpoint("http://localhost:8000/generate").status,
            CheckStatus::Ok
        );
    }

    #[test]
    fn test_check_tools() {
        let mut settings = Settings::default();
        assert_eq!(check_tools(&settings)[0].status, CheckStatus::Warning);

        settings.tools.push(ToolSettings {
            name: "Counter".to_string(),
            description: "Counts objects".to_string(),
            endpoint: "not a url".to_string(),
            parameters: vec![],
            returns: vec![],
            timeout_secs: 5,
        });
        assert_eq!(check_tools(&settings)[0].status, CheckStatus::Error);
    }
}

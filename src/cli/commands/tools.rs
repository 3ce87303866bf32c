//! Tools command - list the configured tool catalog.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::tools::ToolRegistry;
use anyhow::Result;
use console::style;

/// Run the tools command.
pub fn run_tools(settings: &Settings) -> Result<()> {
    preflight::check(Operation::Tools, &settings.lmm)?;
    let registry = ToolRegistry::from_settings(&settings.tools)?;

    if registry.is_empty() {
        Output::warning("No tools configured.");
        Output::info("Declare tools under [[tools]] in the config file (skue config edit).");
        return Ok(());
    }

    Output::header(&format!("Tools ({})", registry.len()));
    for descriptor in registry.describe_all() {
        println!();
        println!("  {} {}", style(&descriptor.name).bold(), style(&descriptor.description).dim());
        for param in &descriptor.parameters {
            let requirement = if param.required { "required" } else { "optional" };
            Output::kv(&param.name, &format!("{} ({})", param.kind, requirement));
        }
        if !descriptor.returns.is_empty() {
            let fields = descriptor
                .returns
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Output::kv("returns", &fields);
        }
    }
    println!();

    Ok(())
}

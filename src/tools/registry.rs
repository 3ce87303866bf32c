//! Catalog of registered tools.

use super::{RemoteTool, ToolDescriptor, ToolHandle};
use crate::config::ToolSettings;
use crate::error::{Result, SkueError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

struct Entry {
    descriptor: Arc<ToolDescriptor>,
    handle: Arc<dyn ToolHandle>,
}

/// Registry of all available tools.
///
/// Populated once at startup, then shared as `Arc<ToolRegistry>` and only
/// read. Registration order is preserved so the planner always sees the
/// catalog in the same order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry of remote tools from configuration.
    pub fn from_settings(tools: &[ToolSettings]) -> Result<Self> {
        let mut registry = Self::new();
        for settings in tools {
            let descriptor = ToolDescriptor {
                name: settings.name.clone(),
                description: settings.description.clone(),
                parameters: settings.parameters.clone(),
                returns: settings.returns.clone(),
            };
            let handle = RemoteTool::from_settings(settings, &descriptor)?;
            registry.register(descriptor, Arc::new(handle))?;
        }
        info!("Registered {} tool(s)", registry.len());
        Ok(registry)
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, descriptor: ToolDescriptor, handle: Arc<dyn ToolHandle>) -> Result<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(SkueError::DuplicateTool(descriptor.name));
        }
        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(Entry {
            descriptor: Arc::new(descriptor),
            handle,
        });
        Ok(())
    }

    /// All descriptors, in registration order.
    pub fn describe_all(&self) -> Vec<Arc<ToolDescriptor>> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Look up the executable handle of a tool.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ToolHandle>> {
        self.entry(name).map(|e| e.handle.clone())
    }

    /// Look up the descriptor of a tool.
    pub fn descriptor(&self, name: &str) -> Result<Arc<ToolDescriptor>> {
        self.entry(name).map(|e| e.descriptor.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Render the whole catalog for the planner prompt.
    pub fn catalog_for_prompt(&self) -> String {
        if self.entries.is_empty() {
            return "(no tools are available)\n".to_string();
        }
        self.entries
            .iter()
            .map(|e| e.descriptor.describe_for_prompt())
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| SkueError::UnknownTool(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ParamKind, ParamSpec};
    use serde_json::{json, Value};

    fn noop() -> Arc<dyn ToolHandle> {
        Arc::new(FnTool::new(|_: &Value| Ok(json!({}))))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("Detector", "Finds objects"), noop())
            .unwrap();
        registry
            .register(ToolDescriptor::new("Counter", "Counts objects"), noop())
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("Counter").is_ok());
        assert!(matches!(
            registry.resolve("Segmenter"),
            Err(SkueError::UnknownTool(name)) if name == "Segmenter"
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("Counter", "Counts objects"), noop())
            .unwrap();
        let err = registry
            .register(ToolDescriptor::new("Counter", "Another counter"), noop())
            .unwrap_err();
        assert!(matches!(err, SkueError::DuplicateTool(_)));
        assert_eq!(registry.descriptor("Counter").unwrap().description, "Counts objects");
    }

    #[test]
    fn test_describe_all_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["Zoom", "Area", "Crop"] {
            registry
                .register(
                    ToolDescriptor::new(name, "tool")
                        .param(ParamSpec::required("image", ParamKind::Image)),
                    noop(),
                )
                .unwrap();
        }

        let names: Vec<String> = registry.describe_all().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["Zoom", "Area", "Crop"]);

        let catalog = registry.catalog_for_prompt();
        assert!(catalog.find("- Zoom").unwrap() < catalog.find("- Crop").unwrap());
    }

    #[test]
    fn test_from_settings() {
        let tools = vec![ToolSettings {
            name: "Counter".to_string(),
            description: "Counts objects".to_string(),
            endpoint: "http://localhost:8000/count".to_string(),
            parameters: vec![ParamSpec::required("prompt", ParamKind::String)],
            returns: vec![],
            timeout_secs: 10,
        }];
        let registry = ToolRegistry::from_settings(&tools).unwrap();
        assert!(registry.contains("Counter"));
    }
}

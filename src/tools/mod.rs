//! Tool subsystem for agent-callable capabilities.
//!
//! Each tool implements the [`Tool`] trait defined in [`traits`], which
//! requires a unique name, description, typed input schema, and an async
//! `invoke` method returning an observation string. Tools are assembled into a
//! [`ToolRegistry`] by [`default_tools`]; the registry is read-only once the
//! agent starts, so the prompt renderer sees a stable snapshot.
//!
//! To add a new tool, implement [`Tool`] in a new submodule and register it in
//! [`default_tools`].

pub mod open_app;
pub mod open_website;
pub mod sandbox_tools;
pub mod traits;

pub use open_app::OpenAppTool;
pub use open_website::OpenWebsiteTool;
pub use sandbox_tools::{
    CloseSandboxTool, ExecutorTool, FileReadTool, FileWriteTool, ListFilesTool,
};
pub use traits::{FieldSpec, FieldType, InputSchema, Tool, ToolSpec, ValidationError};

use crate::config::Config;
use crate::sandbox::SandboxManager;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Registry lookup/registration failures.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("tool '{0}' is not registered")]
    UnknownTool(String),
}

/// Fixed mapping from tool name to its contract and implementation.
///
/// Registration order is preserved: [`ToolRegistry::all_specs`] returns specs
/// in the order tools were registered, which keeps rendered prompts
/// reproducible across runs.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(tool);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.entries[i]))
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Registered specs in registration order.
    pub fn all_specs(&self) -> Vec<ToolSpec> {
        self.entries.iter().map(|t| t.spec()).collect()
    }

    pub fn names(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Create the default tool registry (7 tools: app/website openers plus the
/// five sandbox-backed code tools sharing one [`SandboxManager`]).
pub fn default_tools(
    config: &Config,
    sandbox: Arc<SandboxManager>,
) -> Result<ToolRegistry, RegistryError> {
    let exec_timeout = std::time::Duration::from_secs(config.sandbox.exec_timeout_secs);

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(OpenAppTool::new()))?;
    registry.register(Arc::new(OpenWebsiteTool::new()))?;
    registry.register(Arc::new(ExecutorTool::new(sandbox.clone(), exec_timeout)))?;
    registry.register(Arc::new(FileReadTool::new(sandbox.clone())))?;
    registry.register(Arc::new(FileWriteTool::new(sandbox.clone())))?;
    registry.register(Arc::new(ListFilesTool::new(sandbox.clone())))?;
    registry.register(Arc::new(CloseSandboxTool::new(sandbox)))?;
    Ok(registry)
}

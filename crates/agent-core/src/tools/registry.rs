use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::tools::{FunctionSchema, ToolError, ToolSchema};

/// A named capability the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}

pub type SharedTool = Arc<dyn Tool>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool with name '{0}' already registered")]
    DuplicateTool(String),

    #[error("invalid tool: {0}")]
    InvalidTool(String),
}

/// Collects capabilities at startup. [`build`](Self::build) freezes them
/// into a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<SharedTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    /// Add `tool` under its own name. The first tool to claim a name keeps it.
    pub fn register_shared(&mut self, tool: SharedTool) -> Result<(), RegistryError> {
        let name = tool.name();
        if name.trim().is_empty() || name.trim() != name {
            return Err(RegistryError::InvalidTool(format!(
                "tool name '{}' is empty or padded",
                name
            )));
        }
        if !tool.parameters_schema().is_object() {
            return Err(RegistryError::InvalidTool(format!(
                "parameters of '{}' must be a JSON object schema",
                name
            )));
        }
        if self.index.contains_key(name) {
            return Err(RegistryError::DuplicateTool(name.to_string()));
        }

        self.index.insert(name.to_string(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn build(self) -> ToolRegistry {
        let schemas = self.tools.iter().map(|tool| tool.to_schema()).collect();
        ToolRegistry {
            tools: self.tools,
            index: self.index,
            schemas,
        }
    }
}

/// Read-only name to capability table, shared by every turn.
///
/// Schemas are rendered once at build time and listed in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<SharedTool>,
    index: HashMap<String, usize>,
    schemas: Vec<ToolSchema>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.index.get(name).map(|&slot| Arc::clone(&self.tools[slot]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// What the model is told it may call.
    pub fn list_tools(&self) -> &[ToolSchema] {
        &self.schemas
    }

    pub fn list_tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

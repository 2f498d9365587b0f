//! Integer arithmetic tools.

use agent_core::tools::{Tool, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct OperandArgs {
    a: i64,
    b: i64,
}

fn parse_operands(args: Value) -> Result<OperandArgs, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn operands_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": { "type": "integer" },
            "b": { "type": "integer" }
        },
        "required": ["a", "b"]
    })
}

/// Adds two integers.
pub struct AddTool;

impl AddTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AddTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers"
    }

    fn parameters_schema(&self) -> Value {
        operands_schema()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let OperandArgs { a, b } = parse_operands(args)?;
        a.checked_add(b)
            .map(|sum| json!(sum))
            .ok_or_else(|| ToolError::Execution(format!("{} + {} overflows", a, b)))
    }
}

/// Multiplies two integers.
pub struct MultiplyTool;

impl MultiplyTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MultiplyTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply two numbers"
    }

    fn parameters_schema(&self) -> Value {
        operands_schema()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let OperandArgs { a, b } = parse_operands(args)?;
        a.checked_mul(b)
            .map(|product| json!(product))
            .ok_or_else(|| ToolError::Execution(format!("{} * {} overflows", a, b)))
    }
}

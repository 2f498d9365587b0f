//! Built-in tools: integer arithmetic and a flat-file budget.
//!
//! All tools implement `agent_core::tools::Tool` and are added to a shared
//! registry builder with [`register_builtin_tools`].

use std::sync::Arc;

use agent_core::tools::{RegistryError, ToolRegistryBuilder};

pub mod budget;
pub mod tools;

pub use budget::{BudgetError, BudgetStore};
pub use tools::{AddTool, BudgetOperation, BudgetTool, MultiplyTool};

/// Register the arithmetic tools and one tool per budget operation.
pub fn register_builtin_tools(
    registry: &mut ToolRegistryBuilder,
    budget: Arc<BudgetStore>,
) -> Result<(), RegistryError> {
    registry.register(AddTool::new())?;
    registry.register(MultiplyTool::new())?;
    for tool in BudgetTool::all(budget) {
        registry.register(tool)?;
    }
    log::debug!("Registered {} built-in tools", registry.len());
    Ok(())
}

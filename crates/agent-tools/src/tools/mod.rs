pub mod budget;
pub mod math;

pub use budget::{BudgetOperation, BudgetTool};
pub use math::{AddTool, MultiplyTool};

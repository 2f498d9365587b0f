//! Budget tools backed by [`BudgetStore`].
//!
//! Every operation is its own registry entry so the model sees one focused
//! schema per action. They share a single store.

use std::sync::Arc;

use agent_core::tools::{Tool, ToolError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::budget::{BudgetError, BudgetStore, DateRange, RecordFields, RecordFilter, RecordType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetOperation {
    AddExpense,
    AddIncome,
    ExpenseTotal,
    IncomeTotal,
    Expenses,
    Incomes,
    Balance,
    ExpenseTotalForCategory,
    ExpenseBreakdown,
    IncomeTotalForCategory,
    IncomeBreakdown,
    AllowedCategories,
    EditRecord,
    DeleteRecord,
    FindRecords,
}

impl BudgetOperation {
    pub const ALL: [BudgetOperation; 15] = [
        BudgetOperation::AddExpense,
        BudgetOperation::AddIncome,
        BudgetOperation::ExpenseTotal,
        BudgetOperation::IncomeTotal,
        BudgetOperation::Expenses,
        BudgetOperation::Incomes,
        BudgetOperation::Balance,
        BudgetOperation::ExpenseTotalForCategory,
        BudgetOperation::ExpenseBreakdown,
        BudgetOperation::IncomeTotalForCategory,
        BudgetOperation::IncomeBreakdown,
        BudgetOperation::AllowedCategories,
        BudgetOperation::EditRecord,
        BudgetOperation::DeleteRecord,
        BudgetOperation::FindRecords,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BudgetOperation::AddExpense => "add_expense",
            BudgetOperation::AddIncome => "add_income",
            BudgetOperation::ExpenseTotal => "get_expense_total",
            BudgetOperation::IncomeTotal => "get_income_total",
            BudgetOperation::Expenses => "get_expenses",
            BudgetOperation::Incomes => "get_incomes",
            BudgetOperation::Balance => "get_balance",
            BudgetOperation::ExpenseTotalForCategory => "get_expense_total_for_category",
            BudgetOperation::ExpenseBreakdown => "get_expense_breakdown_by_category",
            BudgetOperation::IncomeTotalForCategory => "get_income_total_for_category",
            BudgetOperation::IncomeBreakdown => "get_income_breakdown_by_category",
            BudgetOperation::AllowedCategories => "get_allowed_categories",
            BudgetOperation::EditRecord => "edit_record",
            BudgetOperation::DeleteRecord => "delete_record",
            BudgetOperation::FindRecords => "find_records",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BudgetOperation::AddExpense => {
                "Add a new expense to the budget. Only use this when the user mentions spending money."
            }
            BudgetOperation::AddIncome => {
                "Add a new income to the budget. Only use when the user mentions receiving money."
            }
            BudgetOperation::ExpenseTotal => {
                "Calculate the total amount spent between two dates. Use for questions about total expenses in a period."
            }
            BudgetOperation::IncomeTotal => {
                "Calculate the total amount received between two dates. Use for questions about total income in a period."
            }
            BudgetOperation::Expenses => {
                "Retrieve a detailed list of all expenses between two dates. Use if the user asks for a breakdown or list of expenses."
            }
            BudgetOperation::Incomes => {
                "Retrieve a detailed list of all incomes between two dates. Use if the user asks for a breakdown or list of incomes."
            }
            BudgetOperation::Balance => {
                "Calculate net balance (income minus expenses) between two dates. Use when the user asks about profit, savings, or remaining money."
            }
            BudgetOperation::ExpenseTotalForCategory => {
                "Get the total amount spent in a specific category over a time period, e.g. how much went on \"food\"."
            }
            BudgetOperation::ExpenseBreakdown => {
                "Get totals for each expense category over a time period. Use when the user asks where their money went."
            }
            BudgetOperation::IncomeTotalForCategory => {
                "Get the total income for a specific category over a time period, e.g. how much came from \"salary\"."
            }
            BudgetOperation::IncomeBreakdown => {
                "Get totals for each income category over a time period. Use when the user asks where their income came from."
            }
            BudgetOperation::AllowedCategories => {
                "List the valid categories for expenses and incomes. Only these categories can be used when adding records."
            }
            BudgetOperation::EditRecord => {
                "Edit an existing record by its record_id (find it first with find_records). Only use after confirming which record needs editing."
            }
            BudgetOperation::DeleteRecord => {
                "Delete a record by its record_id (find it first with find_records). Only use after confirming which record needs deleting."
            }
            BudgetOperation::FindRecords => {
                "Search for records matching the given filters. Use this when the user describes a record they want to edit or delete."
            }
        }
    }

    pub fn parameters_schema(&self) -> Value {
        match self {
            BudgetOperation::AddExpense | BudgetOperation::AddIncome => object_schema(
                json!({
                    "date": date_property("Date of the transaction"),
                    "amount": { "type": "number", "description": "Amount of money" },
                    "description": { "type": "string", "description": "What the money was for" },
                    "category": category_property(),
                }),
                &["date", "amount", "description", "category"],
            ),
            BudgetOperation::ExpenseTotal
            | BudgetOperation::IncomeTotal
            | BudgetOperation::Expenses
            | BudgetOperation::Incomes
            | BudgetOperation::Balance
            | BudgetOperation::ExpenseBreakdown
            | BudgetOperation::IncomeBreakdown => {
                object_schema(range_properties(), &["from_date", "to_date"])
            }
            BudgetOperation::ExpenseTotalForCategory | BudgetOperation::IncomeTotalForCategory => {
                let mut properties = range_properties();
                properties["category"] = category_property();
                object_schema(properties, &["from_date", "to_date", "category"])
            }
            BudgetOperation::AllowedCategories => object_schema(json!({}), &[]),
            BudgetOperation::EditRecord => object_schema(
                json!({
                    "record_id": { "type": "string", "description": "Id returned by find_records" },
                    "record_type": record_type_property(),
                    "date": date_property("Date of the transaction"),
                    "amount": { "type": "number" },
                    "description": { "type": "string" },
                    "category": category_property(),
                }),
                &["record_id", "record_type", "date", "amount", "description", "category"],
            ),
            BudgetOperation::DeleteRecord => object_schema(
                json!({
                    "record_id": { "type": "string", "description": "Id returned by find_records" },
                }),
                &["record_id"],
            ),
            BudgetOperation::FindRecords => {
                let mut properties = range_properties();
                properties["record_type"] = record_type_property();
                properties["amount"] = json!({ "type": "number", "description": "Exact amount" });
                properties["description"] =
                    json!({ "type": "string", "description": "Case-insensitive substring" });
                properties["category"] = category_property();
                object_schema(properties, &[])
            }
        }
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn date_property(description: &str) -> Value {
    json!({
        "type": "string",
        "description": format!("{} (ISO-8601, e.g. 2024-05-01 or 2024-05-01T18:30:00)", description),
    })
}

fn range_properties() -> Value {
    json!({
        "from_date": date_property("Start of the period, inclusive"),
        "to_date": date_property("End of the period, inclusive"),
    })
}

fn category_property() -> Value {
    json!({
        "type": "string",
        "description": "One of the allowed categories; close misspellings are corrected",
    })
}

fn record_type_property() -> Value {
    json!({ "type": "string", "enum": ["expense", "income"] })
}

#[derive(Debug, Deserialize)]
struct CategoryArgs {
    #[serde(flatten)]
    range: DateRange,
    category: String,
}

#[derive(Debug, Deserialize)]
struct EditArgs {
    record_id: String,
    record_type: RecordType,
    #[serde(flatten)]
    fields: RecordFields,
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    record_id: String,
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    // Tools without parameters may be called with `null`.
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn budget_error(error: BudgetError) -> ToolError {
    match error {
        BudgetError::InvalidCategory(_) | BudgetError::InvalidDate(_) => {
            ToolError::InvalidArguments(error.to_string())
        }
        BudgetError::RecordNotFound(_) | BudgetError::Io(_) | BudgetError::Json(_) => {
            ToolError::Execution(error.to_string())
        }
    }
}

/// One budget operation exposed as a tool.
pub struct BudgetTool {
    store: Arc<BudgetStore>,
    operation: BudgetOperation,
}

impl BudgetTool {
    pub fn new(store: Arc<BudgetStore>, operation: BudgetOperation) -> Self {
        Self { store, operation }
    }

    pub fn operation(&self) -> BudgetOperation {
        self.operation
    }

    /// One tool per operation, all sharing `store`.
    pub fn all(store: Arc<BudgetStore>) -> Vec<BudgetTool> {
        BudgetOperation::ALL
            .iter()
            .map(|operation| BudgetTool::new(store.clone(), *operation))
            .collect()
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let store = &self.store;
        let value = match self.operation {
            BudgetOperation::AddExpense => {
                store
                    .add_record(RecordType::Expense, parse_args(args)?)
                    .await
                    .map_err(budget_error)?;
                json!("Expense recorded successfully.")
            }
            BudgetOperation::AddIncome => {
                store
                    .add_record(RecordType::Income, parse_args(args)?)
                    .await
                    .map_err(budget_error)?;
                json!("Income recorded successfully.")
            }
            BudgetOperation::ExpenseTotal => json!(store
                .total(RecordType::Expense, &parse_args(args)?)
                .await
                .map_err(budget_error)?),
            BudgetOperation::IncomeTotal => json!(store
                .total(RecordType::Income, &parse_args(args)?)
                .await
                .map_err(budget_error)?),
            BudgetOperation::Expenses => json!(store
                .query_records(Some(RecordType::Expense), &parse_args(args)?)
                .await
                .map_err(budget_error)?),
            BudgetOperation::Incomes => json!(store
                .query_records(Some(RecordType::Income), &parse_args(args)?)
                .await
                .map_err(budget_error)?),
            BudgetOperation::Balance => {
                json!(store.balance(&parse_args(args)?).await.map_err(budget_error)?)
            }
            BudgetOperation::ExpenseTotalForCategory | BudgetOperation::IncomeTotalForCategory => {
                let record_type = if self.operation == BudgetOperation::ExpenseTotalForCategory {
                    RecordType::Expense
                } else {
                    RecordType::Income
                };
                let CategoryArgs { range, category } = parse_args(args)?;
                json!(store
                    .total_for_category(record_type, &range, &category)
                    .await
                    .map_err(budget_error)?)
            }
            BudgetOperation::ExpenseBreakdown => json!(store
                .breakdown_by_category(RecordType::Expense, &parse_args(args)?)
                .await
                .map_err(budget_error)?),
            BudgetOperation::IncomeBreakdown => json!(store
                .breakdown_by_category(RecordType::Income, &parse_args(args)?)
                .await
                .map_err(budget_error)?),
            BudgetOperation::AllowedCategories => json!(store.allowed_categories()),
            BudgetOperation::EditRecord => {
                let EditArgs {
                    record_id,
                    record_type,
                    fields,
                } = parse_args(args)?;
                store
                    .edit_record(&record_id, record_type, fields)
                    .await
                    .map_err(budget_error)?;
                json!("Record updated successfully.")
            }
            BudgetOperation::DeleteRecord => {
                let DeleteArgs { record_id } = parse_args(args)?;
                store.delete_record(&record_id).await.map_err(budget_error)?;
                json!("Record deleted successfully.")
            }
            BudgetOperation::FindRecords => {
                let filter: RecordFilter = parse_args(args)?;
                let found = store.find_records(&filter).await.map_err(budget_error)?;
                log::debug!("find_records matched {} record(s)", found.len());
                json!(found)
            }
        };
        Ok(value)
    }
}

#[async_trait]
impl Tool for BudgetTool {
    fn name(&self) -> &str {
        self.operation.name()
    }

    fn description(&self) -> &str {
        self.operation.description()
    }

    fn parameters_schema(&self) -> Value {
        self.operation.parameters_schema()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        self.run(args).await
    }
}

pub mod store;

pub use store::{
    normalize_category, parse_date, BudgetError, BudgetRecord, BudgetStore, DateRange,
    RecordFields, RecordFilter, RecordType, ALLOWED_CATEGORIES,
};

//! Flat JSON file of expense and income records.
//!
//! The whole file is read and rewritten on every operation. All access goes
//! through one async mutex, so concurrent tool calls never interleave a
//! read-modify-write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const ALLOWED_CATEGORIES: &[&str] = &[
    "food",
    "transport",
    "entertainment",
    "utilities",
    "rent",
    "salary",
    "investment",
    "health",
    "education",
    "shopping",
    "other",
];

/// Minimum similarity for a category to be accepted as a misspelling.
const CATEGORY_CUTOFF: f32 = 0.7;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Invalid category '{0}'. Must be one of: {}", ALLOWED_CATEGORIES.join(", "))]
    InvalidCategory(String),

    #[error("Record ID not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid date '{0}', expected an ISO-8601 date or datetime")]
    InvalidDate(String),

    #[error("budget file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("budget file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Expense,
    Income,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Expense => "expense",
            RecordType::Income => "income",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub record_id: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub date: String,
    pub amount: f64,
    pub description: String,
    pub category: String,
}

/// Caller-supplied fields of a record; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordFields {
    pub date: String,
    pub amount: f64,
    pub description: String,
    pub category: String,
}

/// Inclusive date bounds. A date-only `to` covers that whole day.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DateRange {
    #[serde(default, rename = "from_date")]
    pub from: Option<String>,
    #[serde(default, rename = "to_date")]
    pub to: Option<String>,
}

impl DateRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    fn bounds(&self) -> Result<(Option<NaiveDateTime>, Option<NaiveDateTime>), BudgetError> {
        let from = self.from.as_deref().map(parse_date).transpose()?;
        let to = match self.to.as_deref() {
            Some(text) => match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                Ok(day) => day.and_hms_nano_opt(23, 59, 59, 999_999_999),
                Err(_) => Some(parse_date(text)?),
            },
            None => None,
        };
        Ok((from, to))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub record_type: Option<RecordType>,
    #[serde(flatten)]
    pub range: DateRange,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Parse an ISO-8601 date (`2024-05-01`) or datetime, with or without offset.
pub fn parse_date(text: &str) -> Result<NaiveDateTime, BudgetError> {
    let text = text.trim();
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(day.and_time(NaiveTime::MIN));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(datetime);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .map(|datetime| datetime.naive_local())
        .map_err(|_| BudgetError::InvalidDate(text.to_string()))
}

/// Map free-form input onto the closest allowed category.
pub fn normalize_category(category: &str) -> Result<&'static str, BudgetError> {
    let lowered = category.trim().to_lowercase();
    closest_match(&lowered, ALLOWED_CATEGORIES, CATEGORY_CUTOFF)
        .ok_or(BudgetError::InvalidCategory(lowered))
}

/// Best-scoring candidate at or above `cutoff`. Equal scores go to the
/// lexicographically greater candidate, whatever the candidate order.
fn closest_match<'a>(input: &str, candidates: &[&'a str], cutoff: f32) -> Option<&'a str> {
    let mut best: Option<(&'a str, f32)> = None;

    for &candidate in candidates {
        let ratio = TextDiff::from_chars(input, candidate).ratio();
        if ratio < cutoff {
            continue;
        }
        let improves = match best {
            Some((word, score)) => ratio > score || (ratio == score && candidate > word),
            None => true,
        };
        if improves {
            best = Some((candidate, ratio));
        }
    }

    best.map(|(candidate, _)| candidate)
}

pub struct BudgetStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl BudgetStore {
    /// Open the store, creating an empty record file when none exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, BudgetError> {
        let path = path.into();
        if !tokio::fs::try_exists(&path).await? {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, "[]").await?;
            log::info!("Created budget file at {}", path.display());
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn allowed_categories(&self) -> &'static [&'static str] {
        ALLOWED_CATEGORIES
    }

    pub async fn add_record(
        &self,
        record_type: RecordType,
        fields: RecordFields,
    ) -> Result<BudgetRecord, BudgetError> {
        let category = normalize_category(&fields.category)?;
        parse_date(&fields.date)?;

        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let record = BudgetRecord {
            record_id: Uuid::new_v4().to_string(),
            record_type,
            date: fields.date,
            amount: fields.amount,
            description: fields.description,
            category: category.to_string(),
        };
        records.push(record.clone());
        self.save(&records).await?;

        log::debug!("Added {} record {}", record_type.as_str(), record.record_id);
        Ok(record)
    }

    pub async fn edit_record(
        &self,
        record_id: &str,
        record_type: RecordType,
        fields: RecordFields,
    ) -> Result<BudgetRecord, BudgetError> {
        let category = normalize_category(&fields.category)?;
        parse_date(&fields.date)?;

        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|record| record.record_id == record_id)
            .ok_or_else(|| BudgetError::RecordNotFound(record_id.to_string()))?;

        record.record_type = record_type;
        record.date = fields.date;
        record.amount = fields.amount;
        record.description = fields.description;
        record.category = category.to_string();
        let updated = record.clone();

        self.save(&records).await?;
        Ok(updated)
    }

    pub async fn delete_record(&self, record_id: &str) -> Result<(), BudgetError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|record| record.record_id != record_id);
        if records.len() == before {
            return Err(BudgetError::RecordNotFound(record_id.to_string()));
        }
        self.save(&records).await
    }

    pub async fn query_records(
        &self,
        record_type: Option<RecordType>,
        range: &DateRange,
    ) -> Result<Vec<BudgetRecord>, BudgetError> {
        let (from, to) = range.bounds()?;
        let records = self.snapshot().await?;

        let mut out = Vec::new();
        for record in records {
            if record_type.is_some_and(|kind| kind != record.record_type) {
                continue;
            }
            if in_range(&record, from, to)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Records matching every filter that is set.
    ///
    /// A category that does not normalise matches nothing rather than failing.
    pub async fn find_records(&self, filter: &RecordFilter) -> Result<Vec<BudgetRecord>, BudgetError> {
        let category = match filter.category.as_deref() {
            Some(category) => match normalize_category(category) {
                Ok(category) => Some(category),
                Err(_) => return Ok(Vec::new()),
            },
            None => None,
        };
        let needle = filter.description.as_deref().map(str::to_lowercase);

        let mut out = Vec::new();
        for record in self.query_records(filter.record_type, &filter.range).await? {
            if filter
                .amount
                .is_some_and(|amount| (record.amount - amount).abs() > f64::EPSILON)
            {
                continue;
            }
            if needle
                .as_deref()
                .is_some_and(|needle| !record.description.to_lowercase().contains(needle))
            {
                continue;
            }
            if category.is_some_and(|category| record.category != category) {
                continue;
            }
            out.push(record);
        }
        Ok(out)
    }

    pub async fn total(&self, record_type: RecordType, range: &DateRange) -> Result<f64, BudgetError> {
        let records = self.query_records(Some(record_type), range).await?;
        Ok(records.iter().map(|record| record.amount).sum())
    }

    /// Income minus expenses.
    pub async fn balance(&self, range: &DateRange) -> Result<f64, BudgetError> {
        let income = self.total(RecordType::Income, range).await?;
        let expense = self.total(RecordType::Expense, range).await?;
        Ok(income - expense)
    }

    pub async fn total_for_category(
        &self,
        record_type: RecordType,
        range: &DateRange,
        category: &str,
    ) -> Result<f64, BudgetError> {
        let category = normalize_category(category)?;
        let records = self.query_records(Some(record_type), range).await?;
        Ok(records
            .iter()
            .filter(|record| record.category == category)
            .map(|record| record.amount)
            .sum())
    }

    pub async fn breakdown_by_category(
        &self,
        record_type: RecordType,
        range: &DateRange,
    ) -> Result<BTreeMap<String, f64>, BudgetError> {
        let mut totals = BTreeMap::new();
        for record in self.query_records(Some(record_type), range).await? {
            *totals.entry(record.category).or_insert(0.0) += record.amount;
        }
        Ok(totals)
    }

    async fn snapshot(&self) -> Result<Vec<BudgetRecord>, BudgetError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn load(&self) -> Result<Vec<BudgetRecord>, BudgetError> {
        let raw = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn save(&self, records: &[BudgetRecord]) -> Result<(), BudgetError> {
        let raw = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

fn in_range(
    record: &BudgetRecord,
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
) -> Result<bool, BudgetError> {
    if from.is_none() && to.is_none() {
        return Ok(true);
    }
    let date = parse_date(&record.date)?;
    let after_start = from.map_or(true, |from| date >= from);
    let before_end = to.map_or(true, |to| date <= to);
    Ok(after_start && before_end)
}

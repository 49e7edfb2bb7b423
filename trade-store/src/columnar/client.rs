//! Columnar analytical store client port.
//!
//! Append-only: the mappers only ever insert row blocks and select with a
//! filter. A block insert is atomic. Filters render to a ClickHouse `WHERE`
//! clause for real clients and evaluate directly in
//! [`MemoryColumnarClient`](super::MemoryColumnarClient).

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// Values and rows
// =============================================================================

/// A single cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Null,
    Int(i64),
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Array(Vec<ColumnValue>),
}

impl ColumnValue {
    /// Compare two scalars of the same type; `Null`, arrays and mixed
    /// types are incomparable
    pub fn compare(&self, other: &ColumnValue) -> Option<Ordering> {
        use ColumnValue::*;
        match (self, other) {
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Text(a), Text(b)) => Some(a.cmp(b)),
            (Decimal(a), Decimal(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Render as a ClickHouse literal
    pub fn to_sql(&self) -> String {
        match self {
            ColumnValue::Null => "NULL".to_string(),
            ColumnValue::Int(v) => v.to_string(),
            ColumnValue::Text(v) => format!("'{}'", v.replace('\\', "\\\\").replace('\'', "\\'")),
            ColumnValue::Decimal(v) => format!("toDecimal128('{}', {})", v, v.scale()),
            ColumnValue::Date(v) => format!("toDate('{}')", v.format("%Y-%m-%d")),
            ColumnValue::DateTime(v) => {
                format!("toDateTime64('{}', 6, 'UTC')", v.format("%Y-%m-%d %H:%M:%S%.6f"))
            },
            ColumnValue::Array(items) => {
                let rendered: Vec<String> = items.iter().map(ColumnValue::to_sql).collect();
                format!("[{}]", rendered.join(", "))
            },
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl From<Option<String>> for ColumnValue {
    fn from(v: Option<String>) -> Self {
        v.map_or(ColumnValue::Null, ColumnValue::Text)
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Int(v)
    }
}

impl From<Decimal> for ColumnValue {
    fn from(v: Decimal) -> Self {
        ColumnValue::Decimal(v)
    }
}

impl From<NaiveDate> for ColumnValue {
    fn from(v: NaiveDate) -> Self {
        ColumnValue::Date(v)
    }
}

impl From<DateTime<Utc>> for ColumnValue {
    fn from(v: DateTime<Utc>) -> Self {
        ColumnValue::DateTime(v)
    }
}

/// One row: column name to value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRow {
    cells: BTreeMap<String, ColumnValue>,
}

impl ColumnRow {
    /// Empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column (builder style)
    pub fn with(mut self, column: &str, value: impl Into<ColumnValue>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    /// Set a column in place
    pub fn set(&mut self, column: &str, value: impl Into<ColumnValue>) {
        self.cells.insert(column.to_string(), value.into());
    }

    /// Read a column
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.cells.get(column)
    }

    /// Typed accessors reporting failures against `table`
    pub fn reader<'a>(&'a self, table: &'a str) -> RowReader<'a> {
        RowReader { table, row: self }
    }
}

/// Typed, schema-checked access to a row
pub struct RowReader<'a> {
    table: &'a str,
    row: &'a ColumnRow,
}

impl<'a> RowReader<'a> {
    fn cell(&self, column: &str) -> StoreResult<&'a ColumnValue> {
        self.row
            .get(column)
            .ok_or_else(|| StoreError::schema_mismatch(self.table, format!("missing column {}", column)))
    }

    fn mismatch(&self, column: &str, expected: &str, actual: &ColumnValue) -> StoreError {
        StoreError::schema_mismatch(
            self.table,
            format!("column {} expected {}, found {:?}", column, expected, actual),
        )
    }

    pub fn text(&self, column: &str) -> StoreResult<String> {
        match self.cell(column)? {
            ColumnValue::Text(v) => Ok(v.clone()),
            other => Err(self.mismatch(column, "Text", other)),
        }
    }

    pub fn int(&self, column: &str) -> StoreResult<i64> {
        match self.cell(column)? {
            ColumnValue::Int(v) => Ok(*v),
            other => Err(self.mismatch(column, "Int", other)),
        }
    }

    /// Nullable integer; an absent column reads as `None`
    pub fn opt_int(&self, column: &str) -> StoreResult<Option<i64>> {
        match self.row.get(column) {
            None | Some(ColumnValue::Null) => Ok(None),
            Some(ColumnValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(self.mismatch(column, "Nullable(Int)", other)),
        }
    }

    pub fn decimal(&self, column: &str) -> StoreResult<Decimal> {
        match self.cell(column)? {
            ColumnValue::Decimal(v) => Ok(*v),
            other => Err(self.mismatch(column, "Decimal", other)),
        }
    }

    pub fn date(&self, column: &str) -> StoreResult<NaiveDate> {
        match self.cell(column)? {
            ColumnValue::Date(v) => Ok(*v),
            other => Err(self.mismatch(column, "Date", other)),
        }
    }

    pub fn datetime(&self, column: &str) -> StoreResult<DateTime<Utc>> {
        match self.cell(column)? {
            ColumnValue::DateTime(v) => Ok(*v),
            other => Err(self.mismatch(column, "DateTime64", other)),
        }
    }

    /// Nullable text; an absent column reads as `None`
    pub fn opt_text(&self, column: &str) -> StoreResult<Option<String>> {
        match self.row.get(column) {
            None | Some(ColumnValue::Null) => Ok(None),
            Some(ColumnValue::Text(v)) => Ok(Some(v.clone())),
            Some(other) => Err(self.mismatch(column, "Nullable(Text)", other)),
        }
    }

    pub fn array(&self, column: &str) -> StoreResult<&'a [ColumnValue]> {
        match self.cell(column)? {
            ColumnValue::Array(items) => Ok(items.as_slice()),
            other => Err(self.mismatch(column, "Array", other)),
        }
    }

    /// Name of the table the row came from
    pub fn table(&self) -> &'a str {
        self.table
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
        }
    }

    fn holds(&self, actual: &ColumnValue, expected: &ColumnValue) -> bool {
        match (self, actual.compare(expected)) {
            (_, None) => false,
            (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Gte, Some(o)) => o != Ordering::Less,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
        }
    }
}

/// One predicate of a conjunctive filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPredicate {
    /// Scalar column comparison
    Compare {
        column: String,
        op: CompareOp,
        value: ColumnValue,
    },
    /// Scalar column equals one of the values
    In { column: String, values: Vec<ColumnValue> },
    /// Some element of an array column satisfies every condition
    ArrayExists {
        column: String,
        conditions: Vec<(CompareOp, ColumnValue)>,
    },
}

impl ColumnPredicate {
    /// Scalar comparison shorthand
    pub fn compare(column: &str, op: CompareOp, value: impl Into<ColumnValue>) -> Self {
        ColumnPredicate::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate against a row; missing or null cells never match
    pub fn matches(&self, row: &ColumnRow) -> bool {
        match self {
            ColumnPredicate::Compare { column, op, value } => {
                row.get(column).map_or(false, |actual| op.holds(actual, value))
            },
            ColumnPredicate::In { column, values } => row
                .get(column)
                .map_or(false, |actual| values.iter().any(|v| CompareOp::Eq.holds(actual, v))),
            ColumnPredicate::ArrayExists { column, conditions } => match row.get(column) {
                Some(ColumnValue::Array(items)) => items
                    .iter()
                    .any(|item| conditions.iter().all(|(op, value)| op.holds(item, value))),
                _ => false,
            },
        }
    }

    /// Render as a ClickHouse boolean expression
    pub fn to_sql(&self) -> String {
        match self {
            ColumnPredicate::Compare { column, op, value } => {
                format!("{} {} {}", column, op.symbol(), value.to_sql())
            },
            ColumnPredicate::In { values, .. } if values.is_empty() => "0".to_string(),
            ColumnPredicate::In { column, values } => {
                let rendered: Vec<String> = values.iter().map(ColumnValue::to_sql).collect();
                format!("{} IN ({})", column, rendered.join(", "))
            },
            ColumnPredicate::ArrayExists { column, conditions } => {
                let body: Vec<String> = conditions
                    .iter()
                    .map(|(op, value)| format!("x {} {}", op.symbol(), value.to_sql()))
                    .collect();
                let body = if body.is_empty() { "1".to_string() } else { body.join(" AND ") };
                format!("arrayExists(x -> {}, {})", body, column)
            },
        }
    }
}

/// Conjunction of predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFilter {
    pub predicates: Vec<ColumnPredicate>,
}

impl ColumnFilter {
    /// Filter matching every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a predicate
    pub fn and(mut self, predicate: ColumnPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Evaluate every predicate against a row
    pub fn matches(&self, row: &ColumnRow) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Render as a ClickHouse `WHERE` body (`1` when empty)
    pub fn to_sql(&self) -> String {
        if self.predicates.is_empty() {
            return "1".to_string();
        }
        self.predicates
            .iter()
            .map(ColumnPredicate::to_sql)
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

// =============================================================================
// Client
// =============================================================================

/// Append-only analytical store operations used by the mappers
#[async_trait]
pub trait ColumnarClient: Send + Sync {
    /// Insert a block of rows atomically; returns rows written
    async fn insert(&self, table: &str, rows: Vec<ColumnRow>) -> StoreResult<u64>;

    /// Return every row matching the filter
    async fn select(&self, table: &str, filter: &ColumnFilter) -> StoreResult<Vec<ColumnRow>>;
}

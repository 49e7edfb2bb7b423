//! Criteria compiler for the relational store.
//!
//! Produces a `WHERE` clause over the `trades` header table with PostgreSQL
//! positional placeholders, plus the ordered parameters to bind.

use chrono::{DateTime, NaiveDate, Utc};
use trade_domain::SearchCriteria;

/// Typed bind parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

/// Compiled header filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFilter {
    /// Boolean SQL expression (`TRUE` when no predicate is set)
    pub clause: String,
    /// Parameters in placeholder order
    pub params: Vec<SqlParam>,
}

struct ClauseBuilder {
    parts: Vec<String>,
    params: Vec<SqlParam>,
    next: usize,
}

impl ClauseBuilder {
    fn push(&mut self, column: &str, op: &str, param: SqlParam) {
        self.parts.push(format!("{} {} ${}", column, op, self.next));
        self.params.push(param);
        self.next += 1;
    }

    fn push_text(&mut self, column: &str, value: &Option<String>) {
        if let Some(v) = value {
            self.push(column, "=", SqlParam::Text(v.clone()));
        }
    }
}

/// Compile criteria into a header filter whose first placeholder is
/// `$first_placeholder`
pub fn compile(criteria: &SearchCriteria, first_placeholder: usize) -> SqlFilter {
    let mut b = ClauseBuilder {
        parts: Vec::new(),
        params: Vec::new(),
        next: first_placeholder,
    };

    b.push_text("business_unit", &criteria.business_unit);
    b.push_text("market", &criteria.market);
    b.push_text("trader_name", &criteria.trader_name);
    b.push_text("agreement_id", &criteria.agreement_id);
    b.push_text("commodity", &criteria.commodity);
    b.push_text("transaction_type", &criteria.transaction_type);
    b.push_text("reference_zone", &criteria.reference_zone);

    if let Some(date) = criteria.trade_date {
        b.push("trade_date", "=", SqlParam::Date(date));
    }
    if let Some(from) = criteria.trade_timestamp_from {
        b.push("trade_timestamp", ">=", SqlParam::Timestamp(from));
    }
    if let Some(to) = criteria.trade_timestamp_to {
        b.push("trade_timestamp", "<", SqlParam::Timestamp(to));
    }

    let clause = if b.parts.is_empty() {
        "TRUE".to_string()
    } else {
        b.parts.join(" AND ")
    };

    SqlFilter {
        clause,
        params: b.params,
    }
}

//! Document store client port.
//!
//! The adapter talks to a key-value/document store through this trait. A
//! production deployment plugs in a client for its store (one item per
//! partition key, conditional puts, filtered scans); tests use
//! [`MemoryDocumentClient`](super::MemoryDocumentClient).

use crate::error::StoreResult;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A stored item: a JSON object
pub type Document = Map<String, Value>;

/// One filter condition over a top-level attribute
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentCondition {
    /// Attribute equals value
    Eq { attribute: String, value: Value },
    /// Attribute is greater than or equal to value
    Gte { attribute: String, value: Value },
    /// Attribute is strictly less than value
    Lt { attribute: String, value: Value },
}

impl DocumentCondition {
    fn attribute(&self) -> &str {
        match self {
            DocumentCondition::Eq { attribute, .. }
            | DocumentCondition::Gte { attribute, .. }
            | DocumentCondition::Lt { attribute, .. } => attribute,
        }
    }

    fn value(&self) -> &Value {
        match self {
            DocumentCondition::Eq { value, .. }
            | DocumentCondition::Gte { value, .. }
            | DocumentCondition::Lt { value, .. } => value,
        }
    }

    fn operator(&self) -> &'static str {
        match self {
            DocumentCondition::Eq { .. } => "=",
            DocumentCondition::Gte { .. } => ">=",
            DocumentCondition::Lt { .. } => "<",
        }
    }

    /// Evaluate against a document; a missing attribute never matches
    pub fn evaluate(&self, document: &Document) -> bool {
        let Some(actual) = document.get(self.attribute()) else {
            return false;
        };
        match self {
            DocumentCondition::Eq { value, .. } => actual == value,
            DocumentCondition::Gte { value, .. } => {
                matches!(compare_values(actual, value), Some(Ordering::Greater | Ordering::Equal))
            },
            DocumentCondition::Lt { value, .. } => {
                matches!(compare_values(actual, value), Some(Ordering::Less))
            },
        }
    }
}

/// Numbers compare numerically, strings lexicographically; anything else is
/// incomparable
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Conjunction of conditions evaluated by a scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub conditions: Vec<DocumentCondition>,
}

/// Filter rendered as a placeholder expression
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    /// e.g. `#market = :v0 AND #tradeDate = :v1`
    pub expression: String,
    /// Placeholder to attribute name
    pub names: BTreeMap<String, String>,
    /// Placeholder to value
    pub values: BTreeMap<String, Value>,
}

impl DocumentFilter {
    /// Filter that matches every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a condition
    pub fn and(mut self, condition: DocumentCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// True if the filter has no conditions
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate every condition against a document
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|c| c.evaluate(document))
    }

    /// Render as a filter expression, or `None` when there is nothing to filter
    pub fn expression(&self) -> Option<FilterExpression> {
        if self.conditions.is_empty() {
            return None;
        }

        let mut parts = Vec::with_capacity(self.conditions.len());
        let mut names = BTreeMap::new();
        let mut values = BTreeMap::new();

        for (i, condition) in self.conditions.iter().enumerate() {
            let name = format!("#{}", condition.attribute());
            let placeholder = format!(":v{}", i);
            parts.push(format!("{} {} {}", name, condition.operator(), placeholder));
            names.insert(name, condition.attribute().to_string());
            values.insert(placeholder, condition.value().clone());
        }

        Some(FilterExpression {
            expression: parts.join(" AND "),
            names,
            values,
        })
    }
}

/// Precondition on a put
#[derive(Debug, Clone, PartialEq)]
pub enum PutCondition {
    /// No item may exist under the key
    NotExists,
    /// The stored item's `attribute` must equal `value`
    AttributeEquals { attribute: String, value: Value },
}

/// Key-value/document store operations used by the adapter
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Write the whole item under `key`, optionally guarded by a condition
    ///
    /// A failed condition is reported as `StoreError::Conflict`.
    async fn put_item(
        &self,
        table: &str,
        key: &str,
        item: Document,
        condition: Option<PutCondition>,
    ) -> StoreResult<()>;

    /// Read the item under `key`
    async fn get_item(&self, table: &str, key: &str) -> StoreResult<Option<Document>>;

    /// Remove the item under `key`; removing a missing item is not an error
    async fn delete_item(&self, table: &str, key: &str) -> StoreResult<()>;

    /// Return every item matching the filter
    async fn scan(&self, table: &str, filter: &DocumentFilter) -> StoreResult<Vec<Document>>;
}

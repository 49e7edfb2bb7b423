//! Value Objects for the trade domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for aggregate and criteria validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Trade id is empty or blank
    #[error("Missing trade id")]
    MissingTradeId,

    /// A period violates its own invariants
    #[error("Invalid period at position {index}: {reason}")]
    InvalidPeriod {
        /// Position of the period in the aggregate
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// Search criteria cannot be satisfied as written
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// A DTO field could not be converted into the domain type
    #[error("Invalid field {field}: {reason}")]
    InvalidField {
        /// Field name as it appears on the DTO
        field: String,
        /// Conversion failure
        reason: String,
    },
}

// =============================================================================
// TradeId
// =============================================================================

/// TradeId is the sole identity key of a trade across all backends
///
/// # Invariants
/// - Must not be empty or whitespace only
/// - Leading and trailing whitespace is stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradeId(String);

impl TradeId {
    /// Create a new TradeId with validation
    ///
    /// # Examples
    /// ```
    /// # use trade_domain::value_objects::TradeId;
    /// let id = TradeId::new("T-100").unwrap();
    /// assert_eq!(id.as_str(), "T-100");
    /// assert!(TradeId::new("   ").is_err());
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::MissingTradeId` if the value is blank
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::MissingTradeId);
        }
        if trimmed.len() == value.len() {
            Ok(Self(value))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id and return the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for TradeId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TradeId {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TradeId> for String {
    fn from(id: TradeId) -> Self {
        id.0
    }
}

impl AsRef<str> for TradeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_id_rejects_blank() {
        assert_eq!(TradeId::new(""), Err(DomainError::MissingTradeId));
        assert_eq!(TradeId::new(" \t"), Err(DomainError::MissingTradeId));
    }

    #[test]
    fn test_trade_id_trims() {
        let id = TradeId::new("  T-7 ").unwrap();
        assert_eq!(id.as_str(), "T-7");
        assert_eq!(id.to_string(), "T-7");
    }

    #[test]
    fn test_trade_id_serde_validates() {
        let ok: TradeId = serde_json::from_str("\"T-1\"").unwrap();
        assert_eq!(ok.as_str(), "T-1");

        let err = serde_json::from_str::<TradeId>("\"\"");
        assert!(err.is_err());
    }
}

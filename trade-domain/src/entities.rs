//! Domain Entities for trade persistence
//!
//! The trade aggregate is a header plus an exclusively owned, ordered
//! collection of periods. It is the unit of persistence on every backend.

use crate::value_objects::{DomainError, TradeId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Trade Header
// =============================================================================

/// Scalar attributes of a trade, independent of any backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeHeader {
    pub trade_id: TradeId,
    /// Counterparty / business unit
    pub business_unit: String,
    pub market: String,
    pub trader_name: String,
    pub agreement_id: String,
    pub commodity: String,
    pub transaction_type: String,
    pub reference_zone: String,
    pub trade_date: NaiveDate,
    pub trade_timestamp: DateTime<Utc>,
}

// =============================================================================
// Trade Period
// =============================================================================

/// A time-bounded line item belonging to exactly one trade
///
/// Instants are persisted with microsecond precision on every backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Overrides the header reference zone for this period only
    pub reference_zone: Option<String>,
}

impl TradePeriod {
    /// Create a period without a reference zone override
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            start,
            end,
            quantity,
            price,
            reference_zone: None,
        }
    }

    /// Set the per-period reference zone override
    pub fn with_reference_zone(mut self, zone: impl Into<String>) -> Self {
        self.reference_zone = Some(zone.into());
        self
    }

    /// Check the period's own invariants
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPeriod` if the end lies before the start,
    /// the quantity is negative or the override zone is blank
    pub fn validate(&self, index: usize) -> Result<(), DomainError> {
        if self.end < self.start {
            return Err(DomainError::InvalidPeriod {
                index,
                reason: format!("end {} is before start {}", self.end, self.start),
            });
        }
        if self.quantity < Decimal::ZERO {
            return Err(DomainError::InvalidPeriod {
                index,
                reason: format!("quantity {} is negative", self.quantity),
            });
        }
        if matches!(&self.reference_zone, Some(zone) if zone.trim().is_empty()) {
            return Err(DomainError::InvalidPeriod {
                index,
                reason: "reference zone override is blank".to_string(),
            });
        }
        Ok(())
    }

    /// True if the period starts inside the half-open window `[from, to)`
    pub fn starts_within(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
        from.map_or(true, |f| self.start >= f) && to.map_or(true, |t| self.start < t)
    }
}

// =============================================================================
// Trade Aggregate
// =============================================================================

/// Trade header plus its owned, ordered periods
///
/// Key rules:
/// - Persisting an aggregate replaces every period stored for its id
/// - Period order is significant and survives a round trip on every backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeAggregate {
    pub header: TradeHeader,
    pub periods: Vec<TradePeriod>,
}

impl TradeAggregate {
    /// Assemble an aggregate from its parts
    pub fn new(header: TradeHeader, periods: Vec<TradePeriod>) -> Self {
        Self { header, periods }
    }

    /// Identity of the aggregate
    pub fn trade_id(&self) -> &TradeId {
        &self.header.trade_id
    }

    /// Replace the period collection, keeping the header
    pub fn with_periods(mut self, periods: Vec<TradePeriod>) -> Self {
        self.periods = periods;
        self
    }

    /// Validate the aggregate before it reaches any backend
    ///
    /// # Errors
    /// Returns the first `DomainError` found, scanning periods in order
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.header.trade_id.as_str().trim().is_empty() {
            return Err(DomainError::MissingTradeId);
        }
        for (index, period) in self.periods.iter().enumerate() {
            period.validate(index)?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

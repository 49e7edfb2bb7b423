//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the trade aggregate.
//! Implementations are the relational mapper, the document adapter, and the
//! two analytical mappers.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use trade_domain::{SearchCriteria, TradeAggregate, TradeId, TradePeriod};

/// Uniform persistence contract shared by every backend
#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// Short backend name used in logs and errors
    fn backend_name(&self) -> &'static str;

    /// Create or fully replace the aggregate (header and every period)
    async fn persist(&self, trade: &TradeAggregate) -> Result<TradeAggregate, StoreError>;

    /// Find a trade by id, with periods in their original order
    async fn find_by_trade_id(&self, id: &TradeId) -> Result<Option<TradeAggregate>, StoreError>;

    /// Find trades whose header matches every predicate set in `criteria`
    async fn search_by_criteria(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<TradeAggregate>, StoreError>;

    /// Remove the trade and all of its periods (idempotent)
    async fn delete_by_trade_id(&self, id: &TradeId) -> Result<(), StoreError>;
}

/// Physical layout of an analytical store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OlapLayout {
    /// One row per trade, periods as position-aligned arrays
    Flat,
    /// One row per (trade, period), header repeated
    Fact,
}

impl OlapLayout {
    /// Layout name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            OlapLayout::Flat => "flat",
            OlapLayout::Fact => "fact",
        }
    }
}

/// Period-level query for analytical stores
///
/// Header predicates come from `criteria`; the remaining fields constrain
/// individual periods and must all hold for the same period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodQuery {
    pub criteria: SearchCriteria,
    /// Inclusive lower bound on period start
    pub start_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on period start
    pub start_to: Option<DateTime<Utc>>,
    /// Periods with quantity strictly above this value
    pub min_quantity_exclusive: Option<Decimal>,
}

impl PeriodQuery {
    /// Query with no constraints
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict header attributes
    pub fn with_criteria(mut self, criteria: SearchCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Periods starting in `[from, to)`
    pub fn starting_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.start_from = Some(from);
        self.start_to = Some(to);
        self
    }

    /// Periods whose quantity exceeds `quantity`
    pub fn quantity_above(mut self, quantity: Decimal) -> Self {
        self.min_quantity_exclusive = Some(quantity);
        self
    }

    /// Exact per-period condition applied after pruning
    pub fn matches_period(&self, period: &TradePeriod) -> bool {
        period.starts_within(self.start_from, self.start_to)
            && self.min_quantity_exclusive.map_or(true, |q| period.quantity > q)
    }
}

/// A period returned by a period-level query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRecord {
    pub trade_id: TradeId,
    /// Position of the period in its trade
    pub position: usize,
    pub period: TradePeriod,
}

/// Analytical mapper capability shared by the flat and fact layouts
#[async_trait]
pub trait AnalyticalTradeMapper: TradeRepository {
    /// Which physical layout this mapper writes
    fn layout(&self) -> OlapLayout;

    /// Live periods matching a period-level query
    async fn find_periods(&self, query: &PeriodQuery) -> Result<Vec<PeriodRecord>, StoreError>;
}

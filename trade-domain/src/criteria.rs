//! Backend-agnostic search criteria
//!
//! One canonical value type with explicit optional predicates over header
//! attributes. Every backend compiles this same type into its native filter.
//! Present predicates compose with AND; absent predicates impose nothing.

use crate::entities::TradeHeader;
use crate::value_objects::DomainError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Optional predicates over trade header attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub business_unit: Option<String>,
    pub market: Option<String>,
    pub trader_name: Option<String>,
    pub agreement_id: Option<String>,
    pub commodity: Option<String>,
    pub transaction_type: Option<String>,
    pub reference_zone: Option<String>,
    /// Exact trade date
    pub trade_date: Option<NaiveDate>,
    /// Inclusive lower bound on the trade timestamp
    pub trade_timestamp_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the trade timestamp
    pub trade_timestamp_to: Option<DateTime<Utc>>,
}

/// Names each predicate of [`SearchCriteria`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriteriaField {
    BusinessUnit,
    Market,
    TraderName,
    AgreementId,
    Commodity,
    TransactionType,
    ReferenceZone,
    TradeDate,
    TradeTimestampFrom,
    TradeTimestampTo,
}

impl CriteriaField {
    /// Every predicate, in declaration order
    pub const ALL: [CriteriaField; 10] = [
        CriteriaField::BusinessUnit,
        CriteriaField::Market,
        CriteriaField::TraderName,
        CriteriaField::AgreementId,
        CriteriaField::Commodity,
        CriteriaField::TransactionType,
        CriteriaField::ReferenceZone,
        CriteriaField::TradeDate,
        CriteriaField::TradeTimestampFrom,
        CriteriaField::TradeTimestampTo,
    ];
}

impl SearchCriteria {
    /// Criteria with no predicates (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by business unit
    pub fn business_unit(mut self, value: impl Into<String>) -> Self {
        self.business_unit = Some(value.into());
        self
    }

    /// Filter by market
    pub fn market(mut self, value: impl Into<String>) -> Self {
        self.market = Some(value.into());
        self
    }

    /// Filter by trader name
    pub fn trader_name(mut self, value: impl Into<String>) -> Self {
        self.trader_name = Some(value.into());
        self
    }

    /// Filter by agreement id
    pub fn agreement_id(mut self, value: impl Into<String>) -> Self {
        self.agreement_id = Some(value.into());
        self
    }

    /// Filter by commodity
    pub fn commodity(mut self, value: impl Into<String>) -> Self {
        self.commodity = Some(value.into());
        self
    }

    /// Filter by transaction type
    pub fn transaction_type(mut self, value: impl Into<String>) -> Self {
        self.transaction_type = Some(value.into());
        self
    }

    /// Filter by header reference zone
    pub fn reference_zone(mut self, value: impl Into<String>) -> Self {
        self.reference_zone = Some(value.into());
        self
    }

    /// Filter by exact trade date
    pub fn trade_date(mut self, value: NaiveDate) -> Self {
        self.trade_date = Some(value);
        self
    }

    /// Filter by trade timestamp in `[from, to)`
    pub fn traded_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.trade_timestamp_from = Some(from);
        self.trade_timestamp_to = Some(to);
        self
    }

    /// Filter by trade timestamp at or after `from`
    pub fn traded_from(mut self, from: DateTime<Utc>) -> Self {
        self.trade_timestamp_from = Some(from);
        self
    }

    /// Filter by trade timestamp strictly before `to`
    pub fn traded_before(mut self, to: DateTime<Utc>) -> Self {
        self.trade_timestamp_to = Some(to);
        self
    }

    /// Remove one predicate
    pub fn without(mut self, field: CriteriaField) -> Self {
        match field {
            CriteriaField::BusinessUnit => self.business_unit = None,
            CriteriaField::Market => self.market = None,
            CriteriaField::TraderName => self.trader_name = None,
            CriteriaField::AgreementId => self.agreement_id = None,
            CriteriaField::Commodity => self.commodity = None,
            CriteriaField::TransactionType => self.transaction_type = None,
            CriteriaField::ReferenceZone => self.reference_zone = None,
            CriteriaField::TradeDate => self.trade_date = None,
            CriteriaField::TradeTimestampFrom => self.trade_timestamp_from = None,
            CriteriaField::TradeTimestampTo => self.trade_timestamp_to = None,
        }
        self
    }

    /// Whether a given predicate is set
    pub fn is_set(&self, field: CriteriaField) -> bool {
        match field {
            CriteriaField::BusinessUnit => self.business_unit.is_some(),
            CriteriaField::Market => self.market.is_some(),
            CriteriaField::TraderName => self.trader_name.is_some(),
            CriteriaField::AgreementId => self.agreement_id.is_some(),
            CriteriaField::Commodity => self.commodity.is_some(),
            CriteriaField::TransactionType => self.transaction_type.is_some(),
            CriteriaField::ReferenceZone => self.reference_zone.is_some(),
            CriteriaField::TradeDate => self.trade_date.is_some(),
            CriteriaField::TradeTimestampFrom => self.trade_timestamp_from.is_some(),
            CriteriaField::TradeTimestampTo => self.trade_timestamp_to.is_some(),
        }
    }

    /// Number of predicates set
    pub fn predicate_count(&self) -> usize {
        CriteriaField::ALL.iter().filter(|f| self.is_set(**f)).count()
    }

    /// True if no predicate is set
    pub fn is_empty(&self) -> bool {
        self.predicate_count() == 0
    }

    /// Reject criteria whose timestamp bounds are inverted
    ///
    /// `from == to` is accepted and matches nothing.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let (Some(from), Some(to)) = (self.trade_timestamp_from, self.trade_timestamp_to) {
            if from > to {
                return Err(DomainError::InvalidCriteria(format!(
                    "trade timestamp range is inverted: {} > {}",
                    from, to
                )));
            }
        }
        Ok(())
    }

    /// Reference evaluation against a header
    ///
    /// Backends compile criteria into native filters; this is the semantics
    /// they must agree with.
    pub fn matches(&self, header: &TradeHeader) -> bool {
        fn eq(expected: &Option<String>, actual: &str) -> bool {
            expected.as_deref().map_or(true, |e| e == actual)
        }

        eq(&self.business_unit, &header.business_unit)
            && eq(&self.market, &header.market)
            && eq(&self.trader_name, &header.trader_name)
            && eq(&self.agreement_id, &header.agreement_id)
            && eq(&self.commodity, &header.commodity)
            && eq(&self.transaction_type, &header.transaction_type)
            && eq(&self.reference_zone, &header.reference_zone)
            && self.trade_date.map_or(true, |d| header.trade_date == d)
            && self.trade_timestamp_from.map_or(true, |f| header.trade_timestamp >= f)
            && self.trade_timestamp_to.map_or(true, |t| header.trade_timestamp < t)
    }
}

//! Externally visible trade representation
//!
//! The DTO is what crosses the service boundary (camelCase JSON). Converting
//! into the aggregate validates; converting out is total.

use crate::entities::{TradeAggregate, TradeHeader, TradePeriod};
use crate::value_objects::{DomainError, TradeId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade as exchanged with callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDto {
    pub trade_id: Option<String>,
    #[serde(default)]
    pub business_unit: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub trader_name: String,
    #[serde(default)]
    pub agreement_id: String,
    #[serde(default)]
    pub commodity: String,
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub reference_zone: String,
    pub trade_date: Option<NaiveDate>,
    pub trade_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub periods: Vec<PeriodDto>,
}

/// Period as exchanged with callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDto {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_zone: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, DomainError> {
    value.ok_or_else(|| DomainError::InvalidField {
        field: field.to_string(),
        reason: "missing".to_string(),
    })
}

impl TryFrom<TradeDto> for TradeAggregate {
    type Error = DomainError;

    fn try_from(dto: TradeDto) -> Result<Self, Self::Error> {
        let trade_id = TradeId::new(dto.trade_id.unwrap_or_default())?;
        let header = TradeHeader {
            trade_id,
            business_unit: dto.business_unit,
            market: dto.market,
            trader_name: dto.trader_name,
            agreement_id: dto.agreement_id,
            commodity: dto.commodity,
            transaction_type: dto.transaction_type,
            reference_zone: dto.reference_zone,
            trade_date: required(dto.trade_date, "tradeDate")?,
            trade_timestamp: required(dto.trade_timestamp, "tradeTimestamp")?,
        };
        let periods = dto
            .periods
            .into_iter()
            .map(|p| TradePeriod {
                start: p.start_time,
                end: p.end_time,
                quantity: p.quantity,
                price: p.price,
                reference_zone: p.reference_zone,
            })
            .collect();

        let trade = TradeAggregate::new(header, periods);
        trade.validate()?;
        Ok(trade)
    }
}

impl From<&TradeAggregate> for TradeDto {
    fn from(trade: &TradeAggregate) -> Self {
        let h = &trade.header;
        Self {
            trade_id: Some(h.trade_id.to_string()),
            business_unit: h.business_unit.clone(),
            market: h.market.clone(),
            trader_name: h.trader_name.clone(),
            agreement_id: h.agreement_id.clone(),
            commodity: h.commodity.clone(),
            transaction_type: h.transaction_type.clone(),
            reference_zone: h.reference_zone.clone(),
            trade_date: Some(h.trade_date),
            trade_timestamp: Some(h.trade_timestamp),
            periods: trade
                .periods
                .iter()
                .map(|p| PeriodDto {
                    start_time: p.start,
                    end_time: p.end,
                    quantity: p.quantity,
                    price: p.price,
                    reference_zone: p.reference_zone.clone(),
                })
                .collect(),
        }
    }
}

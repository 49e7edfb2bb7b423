//! Document layout of a trade.
//!
//! One self-contained item per trade, keyed by `tradeId`. Instants are epoch
//! microseconds so range filters compare numerically; the trade date is an
//! ISO `YYYY-MM-DD` string.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trade_domain::{TradeAggregate, TradeHeader, TradeId, TradePeriod};

use super::client::Document;

/// Top-level attribute names
pub mod attr {
    pub const TRADE_ID: &str = "tradeId";
    pub const BUSINESS_UNIT: &str = "businessUnit";
    pub const MARKET: &str = "market";
    pub const TRADER_NAME: &str = "traderName";
    pub const AGREEMENT_ID: &str = "agreementId";
    pub const COMMODITY: &str = "commodity";
    pub const TRANSACTION_TYPE: &str = "transactionType";
    pub const REFERENCE_ZONE: &str = "referenceZone";
    pub const TRADE_DATE: &str = "tradeDate";
    pub const TRADE_TIMESTAMP: &str = "tradeTimestamp";
    pub const REVISION: &str = "revision";
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeDocument {
    trade_id: String,
    business_unit: String,
    market: String,
    trader_name: String,
    agreement_id: String,
    commodity: String,
    transaction_type: String,
    reference_zone: String,
    trade_date: NaiveDate,
    trade_timestamp: i64,
    revision: i64,
    periods: Vec<PeriodDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodDocument {
    position: usize,
    start_time: i64,
    end_time: i64,
    quantity: Decimal,
    price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference_zone: Option<String>,
}

/// Encode an instant the way documents store it
pub fn encode_instant(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

fn decode_instant(table: &str, micros: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::schema_mismatch(table, format!("instant out of range: {}", micros)))
}

/// Build the stored item for a trade at a given revision
pub fn to_document(trade: &TradeAggregate, revision: i64) -> StoreResult<Document> {
    let h = &trade.header;
    let doc = TradeDocument {
        trade_id: h.trade_id.to_string(),
        business_unit: h.business_unit.clone(),
        market: h.market.clone(),
        trader_name: h.trader_name.clone(),
        agreement_id: h.agreement_id.clone(),
        commodity: h.commodity.clone(),
        transaction_type: h.transaction_type.clone(),
        reference_zone: h.reference_zone.clone(),
        trade_date: h.trade_date,
        trade_timestamp: encode_instant(h.trade_timestamp),
        revision,
        periods: trade
            .periods
            .iter()
            .enumerate()
            .map(|(position, p)| PeriodDocument {
                position,
                start_time: encode_instant(p.start),
                end_time: encode_instant(p.end),
                quantity: p.quantity,
                price: p.price,
                reference_zone: p.reference_zone.clone(),
            })
            .collect(),
    };

    match serde_json::to_value(doc) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::backend("document", format!("unexpected encoding: {}", other))),
        Err(e) => Err(StoreError::backend("document", format!("encoding failed: {}", e))),
    }
}

/// Decode a stored item into the aggregate and its revision
pub fn from_document(table: &str, document: Document) -> StoreResult<(TradeAggregate, i64)> {
    let doc: TradeDocument = serde_json::from_value(Value::Object(document))
        .map_err(|e| StoreError::schema_mismatch(table, format!("undecodable document: {}", e)))?;

    let trade_id = TradeId::new(doc.trade_id)
        .map_err(|e| StoreError::schema_mismatch(table, e.to_string()))?;

    let mut stored = doc.periods;
    stored.sort_by_key(|p| p.position);
    if stored.iter().enumerate().any(|(i, p)| p.position != i) {
        return Err(StoreError::schema_mismatch(
            table,
            format!("trade {} has non-contiguous period positions", trade_id),
        ));
    }

    let mut periods = Vec::with_capacity(stored.len());
    for p in stored {
        periods.push(TradePeriod {
            start: decode_instant(table, p.start_time)?,
            end: decode_instant(table, p.end_time)?,
            quantity: p.quantity,
            price: p.price,
            reference_zone: p.reference_zone,
        });
    }

    let header = TradeHeader {
        trade_id,
        business_unit: doc.business_unit,
        market: doc.market,
        trader_name: doc.trader_name,
        agreement_id: doc.agreement_id,
        commodity: doc.commodity,
        transaction_type: doc.transaction_type,
        reference_zone: doc.reference_zone,
        trade_date: doc.trade_date,
        trade_timestamp: decode_instant(table, doc.trade_timestamp)?,
    };

    Ok((TradeAggregate::new(header, periods), doc.revision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn trade() -> TradeAggregate {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        TradeAggregate::new(
            TradeHeader {
                trade_id: TradeId::new("T-1").unwrap(),
                business_unit: "BU".into(),
                market: "DE".into(),
                trader_name: "bob".into(),
                agreement_id: "AG".into(),
                commodity: "POWER".into(),
                transaction_type: "SELL".into(),
                reference_zone: "Z".into(),
                trade_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                trade_timestamp: t0,
            },
            vec![
                TradePeriod::new(t0, t1, dec!(100), dec!(50.0)),
                TradePeriod::new(t1, t1, dec!(80), dec!(52.5)).with_reference_zone("AT"),
            ],
        )
    }

    #[test]
    fn test_document_shape() {
        let doc = to_document(&trade(), 42).unwrap();
        assert_eq!(doc.get(attr::TRADE_ID), Some(&json!("T-1")));
        assert_eq!(doc.get(attr::TRADE_DATE), Some(&json!("2024-01-01")));
        assert_eq!(doc.get(attr::REVISION), Some(&json!(42)));
        assert!(doc.get(attr::TRADE_TIMESTAMP).map_or(false, Value::is_i64));
        assert_eq!(doc["periods"][1]["position"], json!(1));
        assert!(doc["periods"][0].get("referenceZone").is_none());
    }

    #[test]
    fn test_decode_restores_order() {
        let mut doc = to_document(&trade(), 1).unwrap();
        if let Some(Value::Array(periods)) = doc.get_mut("periods") {
            periods.reverse();
        }
        let (decoded, revision) = from_document("trades", doc).unwrap();
        assert_eq!(decoded, trade());
        assert_eq!(revision, 1);
    }

    #[test]
    fn test_position_gap_is_schema_mismatch() {
        let mut doc = to_document(&trade(), 1).unwrap();
        doc["periods"][1]["position"] = json!(5);
        let err = from_document("trades", doc).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_missing_attribute_is_schema_mismatch() {
        let mut doc = to_document(&trade(), 1).unwrap();
        doc.remove(attr::MARKET);
        assert!(matches!(
            from_document("trades", doc),
            Err(StoreError::SchemaMismatch { .. })
        ));
    }
}

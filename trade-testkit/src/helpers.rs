//! Trade fixtures.
//!
//! All instants are whole seconds so they survive every backend's precision.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trade_domain::{TradeAggregate, TradeHeader, TradeId, TradePeriod};
use uuid::Uuid;

/// Trade id of the replace scenario
pub const T100: &str = "T-100";

/// Midnight UTC on the given day
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid fixture date")
}

/// Fresh, time-ordered trade id so tests never collide on a shared store
pub fn unique_trade_id(prefix: &str) -> TradeId {
    TradeId::new(format!("{}-{}", prefix, Uuid::now_v7())).expect("non-blank trade id")
}

/// Header with fixed attributes apart from id, market and trade date
pub fn header(trade_id: &str, market: &str, trade_date: NaiveDate) -> TradeHeader {
    TradeHeader {
        trade_id: TradeId::new(trade_id).expect("non-blank trade id"),
        business_unit: "POWER-EU".to_string(),
        market: market.to_string(),
        trader_name: "alice".to_string(),
        agreement_id: "AG-2024-001".to_string(),
        commodity: "POWER".to_string(),
        transaction_type: "BUY".to_string(),
        reference_zone: format!("10Y{}", market),
        trade_date,
        trade_timestamp: Utc.from_utc_datetime(&trade_date.and_hms_opt(9, 30, 0).expect("valid time")),
    }
}

/// Period without a zone override
pub fn period(start: DateTime<Utc>, end: DateTime<Utc>, quantity: Decimal, price: Decimal) -> TradePeriod {
    TradePeriod::new(start, end, quantity, price)
}

/// Two-period trade; the second period overrides the reference zone
pub fn sample_trade(trade_id: &str, market: &str, trade_date: NaiveDate) -> TradeAggregate {
    TradeAggregate::new(
        header(trade_id, market, trade_date),
        vec![
            period(utc(2024, 3, 1), utc(2024, 3, 2), dec!(100), dec!(48.25)),
            period(utc(2024, 3, 2), utc(2024, 3, 3), dec!(80.5), dec!(51.10)).with_reference_zone("10YAT"),
        ],
    )
}

/// `[2024-01-01, 2024-02-01)`, the window of the January periods
pub fn january_2024() -> (DateTime<Utc>, DateTime<Utc>) {
    (utc(2024, 1, 1), utc(2024, 2, 1))
}

/// T-100 with two January periods
pub fn t100_january() -> TradeAggregate {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    TradeAggregate::new(
        header(T100, "DE", date),
        vec![
            period(utc(2024, 1, 1), utc(2024, 1, 2), dec!(100), dec!(50.0)),
            period(utc(2024, 1, 2), utc(2024, 1, 3), dec!(80), dec!(52.5)),
        ],
    )
}

/// T-100 re-persisted with a single February period
pub fn t100_february() -> TradeAggregate {
    t100_january().with_periods(vec![period(utc(2024, 2, 1), utc(2024, 2, 2), dec!(60), dec!(55.0))])
}

/// Three trades dated 2024-01-01 (two DE, one FR) plus one DE trade dated
/// 2024-01-02
pub fn de_fr_trades() -> Vec<TradeAggregate> {
    let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date");
    vec![
        sample_trade("DE-1", "DE", jan1),
        sample_trade("DE-2", "DE", jan1),
        sample_trade("FR-1", "FR", jan1),
        sample_trade("DE-3", "DE", jan2),
    ]
}

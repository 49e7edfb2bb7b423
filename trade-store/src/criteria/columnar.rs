//! Criteria compiler for the columnar analytical store.
//!
//! Header predicates are identical for both layouts since both carry the
//! header as scalar columns. Period-level queries differ: the flat layout
//! can only prune with existential array predicates, the fact layout filters
//! rows directly.

use crate::columnar::client::{ColumnFilter, ColumnPredicate, ColumnValue, CompareOp};
use crate::columnar::col;
use crate::repository::PeriodQuery;
use trade_domain::SearchCriteria;

fn eq(filter: ColumnFilter, column: &str, value: &Option<String>) -> ColumnFilter {
    match value {
        Some(v) => filter.and(ColumnPredicate::compare(column, CompareOp::Eq, v.as_str())),
        None => filter,
    }
}

/// Compile header criteria into a row filter
pub fn compile(criteria: &SearchCriteria) -> ColumnFilter {
    let mut filter = ColumnFilter::all();
    filter = eq(filter, col::BUSINESS_UNIT, &criteria.business_unit);
    filter = eq(filter, col::MARKET, &criteria.market);
    filter = eq(filter, col::TRADER_NAME, &criteria.trader_name);
    filter = eq(filter, col::AGREEMENT_ID, &criteria.agreement_id);
    filter = eq(filter, col::COMMODITY, &criteria.commodity);
    filter = eq(filter, col::TRANSACTION_TYPE, &criteria.transaction_type);
    filter = eq(filter, col::REFERENCE_ZONE, &criteria.reference_zone);

    if let Some(date) = criteria.trade_date {
        filter = filter.and(ColumnPredicate::compare(col::TRADE_DATE, CompareOp::Eq, date));
    }
    if let Some(from) = criteria.trade_timestamp_from {
        filter = filter.and(ColumnPredicate::compare(col::TRADE_TIMESTAMP, CompareOp::Gte, from));
    }
    if let Some(to) = criteria.trade_timestamp_to {
        filter = filter.and(ColumnPredicate::compare(col::TRADE_TIMESTAMP, CompareOp::Lt, to));
    }

    filter
}

/// Pruning filter for a period query over the flat layout
///
/// Each array is tested on its own, so a surviving row only guarantees that
/// some start and some quantity qualify. The mapper re-checks element-wise.
pub fn compile_period_query_flat(query: &PeriodQuery) -> ColumnFilter {
    let mut filter = compile(&query.criteria);

    let mut start_conditions = Vec::new();
    if let Some(from) = query.start_from {
        start_conditions.push((CompareOp::Gte, ColumnValue::DateTime(from)));
    }
    if let Some(to) = query.start_to {
        start_conditions.push((CompareOp::Lt, ColumnValue::DateTime(to)));
    }
    if !start_conditions.is_empty() {
        filter = filter.and(ColumnPredicate::ArrayExists {
            column: col::PERIOD_STARTS.to_string(),
            conditions: start_conditions,
        });
    }

    if let Some(quantity) = query.min_quantity_exclusive {
        filter = filter.and(ColumnPredicate::ArrayExists {
            column: col::PERIOD_QUANTITIES.to_string(),
            conditions: vec![(CompareOp::Gt, ColumnValue::Decimal(quantity))],
        });
    }

    filter
}

/// Exact row filter for a period query over the fact layout
pub fn compile_period_query_fact(query: &PeriodQuery) -> ColumnFilter {
    let mut filter = compile(&query.criteria);
    if let Some(from) = query.start_from {
        filter = filter.and(ColumnPredicate::compare(col::PERIOD_START, CompareOp::Gte, from));
    }
    if let Some(to) = query.start_to {
        filter = filter.and(ColumnPredicate::compare(col::PERIOD_START, CompareOp::Lt, to));
    }
    if let Some(quantity) = query.min_quantity_exclusive {
        filter = filter.and(ColumnPredicate::compare(col::PERIOD_QUANTITY, CompareOp::Gt, quantity));
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_criteria_matches_everything() {
        let filter = compile(&SearchCriteria::new());
        assert!(filter.predicates.is_empty());
        assert_eq!(filter.to_sql(), "1");
    }

    #[test]
    fn test_market_and_date() {
        let criteria = SearchCriteria::new()
            .market("DE")
            .trade_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(
            compile(&criteria).to_sql(),
            "market = 'DE' AND trade_date = toDate('2024-01-01')"
        );
    }

    #[test]
    fn test_flat_period_query_uses_array_predicates() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let query = PeriodQuery::new().starting_between(from, to).quantity_above(dec!(10));

        let sql = compile_period_query_flat(&query).to_sql();
        assert!(sql.starts_with("arrayExists(x -> x >= toDateTime64('2024-01-01 00:00:00.000000', 6, 'UTC')"));
        assert!(sql.ends_with("arrayExists(x -> x > toDecimal128('10', 0), period_quantities)"));
    }

    #[test]
    fn test_fact_period_query_uses_row_predicates() {
        let query = PeriodQuery::new()
            .with_criteria(SearchCriteria::new().market("DE"))
            .quantity_above(dec!(10));
        assert_eq!(
            compile_period_query_fact(&query).to_sql(),
            "market = 'DE' AND period_quantity > toDecimal128('10', 0)"
        );
    }
}

//! Row encoding and version resolution shared by both layouts.

use super::client::{
    ColumnFilter, ColumnPredicate, ColumnRow, ColumnValue, ColumnarClient, CompareOp, RowReader,
};
use super::col;
use crate::error::{StoreError, StoreResult};
use crate::retry::{with_retry, RetryConfig};
use crate::version::WriteStamp;
use std::collections::{BTreeSet, HashMap};
use trade_domain::{TradeHeader, TradeId};

/// Header columns plus version bookkeeping for a live row
pub(crate) fn header_row(header: &TradeHeader, stamp: &WriteStamp) -> ColumnRow {
    ColumnRow::new()
        .with(col::TRADE_ID, header.trade_id.as_str())
        .with(col::BUSINESS_UNIT, header.business_unit.as_str())
        .with(col::MARKET, header.market.as_str())
        .with(col::TRADER_NAME, header.trader_name.as_str())
        .with(col::AGREEMENT_ID, header.agreement_id.as_str())
        .with(col::COMMODITY, header.commodity.as_str())
        .with(col::TRANSACTION_TYPE, header.transaction_type.as_str())
        .with(col::REFERENCE_ZONE, header.reference_zone.as_str())
        .with(col::TRADE_DATE, header.trade_date)
        .with(col::TRADE_TIMESTAMP, header.trade_timestamp)
        .with(col::VERSION, stamp.version)
        .with(col::WRITE_ID, stamp.write_id.as_str())
        .with(col::IS_DELETED, 0_i64)
}

/// Deletion marker; remaining columns take their table defaults
pub(crate) fn tombstone_row(id: &TradeId, stamp: &WriteStamp) -> ColumnRow {
    ColumnRow::new()
        .with(col::TRADE_ID, id.as_str())
        .with(col::VERSION, stamp.version)
        .with(col::WRITE_ID, stamp.write_id.as_str())
        .with(col::IS_DELETED, 1_i64)
}

pub(crate) fn read_header(reader: &RowReader<'_>) -> StoreResult<TradeHeader> {
    let trade_id = TradeId::new(reader.text(col::TRADE_ID)?)
        .map_err(|e| StoreError::schema_mismatch(reader.table(), e.to_string()))?;
    Ok(TradeHeader {
        trade_id,
        business_unit: reader.text(col::BUSINESS_UNIT)?,
        market: reader.text(col::MARKET)?,
        trader_name: reader.text(col::TRADER_NAME)?,
        agreement_id: reader.text(col::AGREEMENT_ID)?,
        commodity: reader.text(col::COMMODITY)?,
        transaction_type: reader.text(col::TRANSACTION_TYPE)?,
        reference_zone: reader.text(col::REFERENCE_ZONE)?,
        trade_date: reader.date(col::TRADE_DATE)?,
        trade_timestamp: reader.datetime(col::TRADE_TIMESTAMP)?,
    })
}

fn read_stamp(reader: &RowReader<'_>) -> StoreResult<WriteStamp> {
    Ok(WriteStamp::new(reader.int(col::VERSION)?, reader.text(col::WRITE_ID)?))
}

/// Keep the rows of `matched` that belong to the latest write of their
/// trade, as seen in `all`, and that are not tombstones
///
/// Writes order by `(version, write_id)`, so a version tie still selects
/// exactly one writer's rows.
pub(crate) fn retain_latest(
    table: &str,
    matched: Vec<ColumnRow>,
    all: &[ColumnRow],
) -> StoreResult<Vec<ColumnRow>> {
    let mut latest: HashMap<String, WriteStamp> = HashMap::new();
    for row in all {
        let reader = row.reader(table);
        let stamp = read_stamp(&reader)?;
        let current = latest.entry(reader.text(col::TRADE_ID)?).or_insert_with(|| stamp.clone());
        if stamp > *current {
            *current = stamp;
        }
    }

    let mut live = Vec::with_capacity(matched.len());
    for row in matched {
        let keep = {
            let reader = row.reader(table);
            let id = reader.text(col::TRADE_ID)?;
            let stamp = read_stamp(&reader)?;
            let deleted = reader.int(col::IS_DELETED)? != 0;
            !deleted && latest.get(&id) == Some(&stamp)
        };
        if keep {
            live.push(row);
        }
    }
    Ok(live)
}

/// Rows matching `filter` that are live in the latest version of their trade
///
/// A trade's latest version may not match the filter while an older one
/// does, so versions are resolved against every row of the matched ids.
pub(crate) async fn select_live(
    client: &dyn ColumnarClient,
    table: &str,
    retry: &RetryConfig,
    filter: &ColumnFilter,
) -> StoreResult<Vec<ColumnRow>> {
    let matched = with_retry(retry, "columnar.select", || client.select(table, filter)).await?;
    if matched.is_empty() {
        return Ok(matched);
    }

    let ids = matched
        .iter()
        .map(|row| row.reader(table).text(col::TRADE_ID))
        .collect::<StoreResult<BTreeSet<_>>>()?;
    let versions = ColumnFilter::all().and(ColumnPredicate::In {
        column: col::TRADE_ID.to_string(),
        values: ids.into_iter().map(ColumnValue::Text).collect(),
    });
    let all = with_retry(retry, "columnar.select_versions", || client.select(table, &versions)).await?;

    retain_latest(table, matched, &all)
}

/// Every live row of one trade's latest version
pub(crate) async fn select_latest_for_id(
    client: &dyn ColumnarClient,
    table: &str,
    retry: &RetryConfig,
    id: &TradeId,
) -> StoreResult<Vec<ColumnRow>> {
    let filter = ColumnFilter::all().and(ColumnPredicate::compare(col::TRADE_ID, CompareOp::Eq, id.as_str()));
    let rows = with_retry(retry, "columnar.select", || client.select(table, &filter)).await?;
    let all = rows.clone();
    retain_latest(table, rows, &all)
}

//! Fact layout: one row per (trade version, period).
//!
//! Header columns repeat on every row. `period_index` carries the position
//! and `period_count` the size of the version's collection, so a read can
//! tell a complete version from a torn one. A trade without periods is one
//! header-only row with a null index.

use super::client::{ColumnRow, ColumnValue, ColumnarClient, RowReader};
use super::col;
use super::rows::{header_row, read_header, select_latest_for_id, select_live, tombstone_row};
use crate::criteria;
use crate::error::{StoreError, StoreResult};
use crate::repository::{AnalyticalTradeMapper, OlapLayout, PeriodQuery, PeriodRecord, TradeRepository};
use crate::retry::{with_retry, RetryConfig};
use crate::version::{VersionClock, WriteStamp};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use trade_domain::{SearchCriteria, TradeAggregate, TradeId, TradePeriod};

const BACKEND: &str = "olap-fact";

/// ClickHouse DDL for the fact layout
pub const FACT_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS trade_period_facts (
    trade_id                String,
    business_unit           String DEFAULT '',
    market                  String DEFAULT '',
    trader_name             String DEFAULT '',
    agreement_id            String DEFAULT '',
    commodity               String DEFAULT '',
    transaction_type        String DEFAULT '',
    reference_zone          String DEFAULT '',
    trade_date              Date DEFAULT toDate(0),
    trade_timestamp         DateTime64(6, 'UTC') DEFAULT toDateTime64(0, 6, 'UTC'),
    version                 Int64,
    write_id                String,
    is_deleted              UInt8 DEFAULT 0,
    period_index            Nullable(UInt32),
    period_count            UInt32 DEFAULT 0,
    period_start            Nullable(DateTime64(6, 'UTC')),
    period_end              Nullable(DateTime64(6, 'UTC')),
    period_quantity         Nullable(Decimal(38, 10)),
    period_price            Nullable(Decimal(38, 10)),
    period_reference_zone   Nullable(String)
)
ENGINE = ReplacingMergeTree(version, is_deleted)
ORDER BY (trade_id, version, write_id, ifNull(period_index, 0))
"#;

fn to_rows(trade: &TradeAggregate, stamp: &WriteStamp) -> Vec<ColumnRow> {
    let count = trade.periods.len() as i64;
    let base = header_row(&trade.header, stamp).with(col::PERIOD_COUNT, count);

    if trade.periods.is_empty() {
        return vec![base.with(col::PERIOD_INDEX, ColumnValue::Null)];
    }

    trade
        .periods
        .iter()
        .enumerate()
        .map(|(index, p)| {
            base.clone()
                .with(col::PERIOD_INDEX, index as i64)
                .with(col::PERIOD_START, p.start)
                .with(col::PERIOD_END, p.end)
                .with(col::PERIOD_QUANTITY, p.quantity)
                .with(col::PERIOD_PRICE, p.price)
                .with(col::PERIOD_REFERENCE_ZONE, p.reference_zone.clone())
        })
        .collect()
}

fn read_period(reader: &RowReader<'_>) -> StoreResult<TradePeriod> {
    Ok(TradePeriod {
        start: reader.datetime(col::PERIOD_START)?,
        end: reader.datetime(col::PERIOD_END)?,
        quantity: reader.decimal(col::PERIOD_QUANTITY)?,
        price: reader.decimal(col::PERIOD_PRICE)?,
        reference_zone: reader.opt_text(col::PERIOD_REFERENCE_ZONE)?,
    })
}

/// Rebuild one trade from the rows of its latest version
///
/// Indices must be exactly `0..period_count`; duplicates, gaps and missing
/// rows are all reported as schema mismatches.
fn from_rows(table: &str, rows: &[ColumnRow]) -> StoreResult<Option<TradeAggregate>> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let first = first.reader(table);
    let header = read_header(&first)?;
    let count = first.int(col::PERIOD_COUNT)?;

    let mut indexed = Vec::with_capacity(rows.len());
    for row in rows {
        let reader = row.reader(table);
        if reader.int(col::PERIOD_COUNT)? != count {
            return Err(StoreError::schema_mismatch(
                table,
                format!("trade {} rows disagree on period_count", header.trade_id),
            ));
        }
        match reader.opt_int(col::PERIOD_INDEX)? {
            Some(index) => indexed.push((index, read_period(&reader)?)),
            None if count == 0 => {},
            None => {
                return Err(StoreError::schema_mismatch(
                    table,
                    format!("trade {} has a header-only row but period_count {}", header.trade_id, count),
                ));
            },
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    let contiguous = indexed.len() as i64 == count
        && indexed.iter().enumerate().all(|(i, (index, _))| *index == i as i64);
    if !contiguous {
        let found: Vec<i64> = indexed.iter().map(|(index, _)| *index).collect();
        return Err(StoreError::schema_mismatch(
            table,
            format!(
                "trade {} expected period indices 0..{}, found {:?}",
                header.trade_id, count, found
            ),
        ));
    }

    let periods = indexed.into_iter().map(|(_, period)| period).collect();
    Ok(Some(TradeAggregate::new(header, periods)))
}

fn group_by_trade(table: &str, rows: Vec<ColumnRow>) -> StoreResult<BTreeMap<String, Vec<ColumnRow>>> {
    let mut grouped: BTreeMap<String, Vec<ColumnRow>> = BTreeMap::new();
    for row in rows {
        let id = row.reader(table).text(col::TRADE_ID)?;
        grouped.entry(id).or_default().push(row);
    }
    Ok(grouped)
}

/// Analytical mapper writing one row per period
pub struct FactTradeMapper {
    client: Arc<dyn ColumnarClient>,
    table: String,
    clock: &'static VersionClock,
    retry: RetryConfig,
}

impl FactTradeMapper {
    /// Create a mapper writing to `table`
    pub fn new(client: Arc<dyn ColumnarClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            clock: VersionClock::global(),
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Table the mapper writes to
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn append(&self, operation: &str, rows: Vec<ColumnRow>) -> StoreResult<u64> {
        with_retry(&self.retry, operation, || self.client.insert(&self.table, rows.clone())).await
    }
}

#[async_trait]
impl TradeRepository for FactTradeMapper {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn persist(&self, trade: &TradeAggregate) -> StoreResult<TradeAggregate> {
        trade.validate()?;
        let stamp = self.clock.stamp();
        let written = self.append("olap_fact.insert", to_rows(trade, &stamp)).await?;

        debug!(
            trade_id = %trade.trade_id(),
            version = stamp.version,
            write_id = %stamp.write_id,
            rows = written,
            "Fact rows appended"
        );
        Ok(trade.clone())
    }

    async fn find_by_trade_id(&self, id: &TradeId) -> StoreResult<Option<TradeAggregate>> {
        let live = select_latest_for_id(self.client.as_ref(), &self.table, &self.retry, id).await?;
        from_rows(&self.table, &live)
    }

    async fn search_by_criteria(&self, criteria: &SearchCriteria) -> StoreResult<Vec<TradeAggregate>> {
        criteria.validate()?;
        let filter = criteria::columnar::compile(criteria);
        debug!(table = %self.table, filter = %filter.to_sql(), "Selecting trade facts");

        let live = select_live(self.client.as_ref(), &self.table, &self.retry, &filter).await?;
        let mut trades = Vec::new();
        for rows in group_by_trade(&self.table, live)?.values() {
            if let Some(trade) = from_rows(&self.table, rows)? {
                trades.push(trade);
            }
        }
        Ok(trades)
    }

    async fn delete_by_trade_id(&self, id: &TradeId) -> StoreResult<()> {
        let stamp = self.clock.stamp();
        let tombstone = tombstone_row(id, &stamp)
            .with(col::PERIOD_INDEX, ColumnValue::Null)
            .with(col::PERIOD_COUNT, 0_i64);
        self.append("olap_fact.tombstone", vec![tombstone]).await?;
        info!(trade_id = %id, version = stamp.version, "Trade facts tombstoned");
        Ok(())
    }
}

#[async_trait]
impl AnalyticalTradeMapper for FactTradeMapper {
    fn layout(&self) -> OlapLayout {
        OlapLayout::Fact
    }

    async fn find_periods(&self, query: &PeriodQuery) -> StoreResult<Vec<PeriodRecord>> {
        query.criteria.validate()?;
        let filter = criteria::columnar::compile_period_query_fact(query);
        debug!(table = %self.table, filter = %filter.to_sql(), "Selecting period facts");

        let live = select_live(self.client.as_ref(), &self.table, &self.retry, &filter).await?;
        let mut records = Vec::with_capacity(live.len());
        for row in &live {
            let reader = row.reader(&self.table);
            let Some(index) = reader.opt_int(col::PERIOD_INDEX)? else {
                continue;
            };
            let position = usize::try_from(index).map_err(|_| {
                StoreError::schema_mismatch(self.table.as_str(), format!("negative period_index {}", index))
            })?;
            let trade_id = TradeId::new(reader.text(col::TRADE_ID)?)
                .map_err(|e| StoreError::schema_mismatch(self.table.as_str(), e.to_string()))?;
            records.push(PeriodRecord {
                trade_id,
                position,
                period: read_period(&reader)?,
            });
        }
        records.sort_by(|a, b| (&a.trade_id, a.position).cmp(&(&b.trade_id, b.position)));
        Ok(records)
    }
}

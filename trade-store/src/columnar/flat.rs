//! Flat layout: one row per trade version.
//!
//! Periods are five position-aligned arrays. Element `i` of every array
//! describes period `i`, so array order is the period order.

use super::client::{ColumnRow, ColumnValue, ColumnarClient, RowReader};
use super::col;
use super::rows::{header_row, read_header, select_latest_for_id, select_live, tombstone_row};
use crate::criteria;
use crate::error::{StoreError, StoreResult};
use crate::repository::{AnalyticalTradeMapper, OlapLayout, PeriodQuery, PeriodRecord, TradeRepository};
use crate::retry::{with_retry, RetryConfig};
use crate::version::{VersionClock, WriteStamp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trade_domain::{SearchCriteria, TradeAggregate, TradeId, TradePeriod};

const BACKEND: &str = "olap-flat";

/// ClickHouse DDL for the flat layout
pub const FLAT_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS trades_flat (
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
    period_starts           Array(DateTime64(6, 'UTC')),
    period_ends             Array(DateTime64(6, 'UTC')),
    period_quantities       Array(Decimal(38, 10)),
    period_prices           Array(Decimal(38, 10)),
    period_reference_zones  Array(Nullable(String))
)
ENGINE = ReplacingMergeTree(version, is_deleted)
ORDER BY trade_id
"#;

fn array(periods: &[TradePeriod], element: impl Fn(&TradePeriod) -> ColumnValue) -> ColumnValue {
    ColumnValue::Array(periods.iter().map(element).collect())
}

fn to_row(trade: &TradeAggregate, stamp: &WriteStamp) -> ColumnRow {
    let periods = trade.periods.as_slice();
    header_row(&trade.header, stamp)
        .with(col::PERIOD_STARTS, array(periods, |p| ColumnValue::DateTime(p.start)))
        .with(col::PERIOD_ENDS, array(periods, |p| ColumnValue::DateTime(p.end)))
        .with(col::PERIOD_QUANTITIES, array(periods, |p| ColumnValue::Decimal(p.quantity)))
        .with(col::PERIOD_PRICES, array(periods, |p| ColumnValue::Decimal(p.price)))
        .with(
            col::PERIOD_REFERENCE_ZONES,
            array(periods, |p| ColumnValue::from(p.reference_zone.clone())),
        )
}

fn element_mismatch(reader: &RowReader<'_>, column: &str, index: usize, value: &ColumnValue) -> StoreError {
    StoreError::schema_mismatch(
        reader.table(),
        format!("{}[{}] has unexpected value {:?}", column, index, value),
    )
}

fn datetimes(reader: &RowReader<'_>, column: &str) -> StoreResult<Vec<DateTime<Utc>>> {
    reader
        .array(column)?
        .iter()
        .enumerate()
        .map(|(i, v)| match v {
            ColumnValue::DateTime(t) => Ok(*t),
            other => Err(element_mismatch(reader, column, i, other)),
        })
        .collect()
}

fn decimals(reader: &RowReader<'_>, column: &str) -> StoreResult<Vec<Decimal>> {
    reader
        .array(column)?
        .iter()
        .enumerate()
        .map(|(i, v)| match v {
            ColumnValue::Decimal(d) => Ok(*d),
            other => Err(element_mismatch(reader, column, i, other)),
        })
        .collect()
}

fn zones(reader: &RowReader<'_>, column: &str) -> StoreResult<Vec<Option<String>>> {
    reader
        .array(column)?
        .iter()
        .enumerate()
        .map(|(i, v)| match v {
            ColumnValue::Null => Ok(None),
            ColumnValue::Text(z) => Ok(Some(z.clone())),
            other => Err(element_mismatch(reader, column, i, other)),
        })
        .collect()
}

/// Rebuild the aggregate from one row, checking the arrays line up
fn from_row(table: &str, row: &ColumnRow) -> StoreResult<TradeAggregate> {
    let reader = row.reader(table);
    let header = read_header(&reader)?;

    let starts = datetimes(&reader, col::PERIOD_STARTS)?;
    let ends = datetimes(&reader, col::PERIOD_ENDS)?;
    let quantities = decimals(&reader, col::PERIOD_QUANTITIES)?;
    let prices = decimals(&reader, col::PERIOD_PRICES)?;
    let zones = zones(&reader, col::PERIOD_REFERENCE_ZONES)?;

    let lengths = [starts.len(), ends.len(), quantities.len(), prices.len(), zones.len()];
    if lengths.iter().any(|&n| n != starts.len()) {
        return Err(StoreError::schema_mismatch(
            table,
            format!("trade {} has period arrays of unequal length {:?}", header.trade_id, lengths),
        ));
    }

    let periods = starts
        .into_iter()
        .zip(ends)
        .zip(quantities)
        .zip(prices)
        .zip(zones)
        .map(|((((start, end), quantity), price), reference_zone)| TradePeriod {
            start,
            end,
            quantity,
            price,
            reference_zone,
        })
        .collect();

    Ok(TradeAggregate::new(header, periods))
}

/// Analytical mapper writing one array-encoded row per trade version
pub struct FlatTradeMapper {
    client: Arc<dyn ColumnarClient>,
    table: String,
    clock: &'static VersionClock,
    retry: RetryConfig,
}

impl FlatTradeMapper {
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

    async fn append(&self, operation: &str, row: ColumnRow) -> StoreResult<()> {
        with_retry(&self.retry, operation, || {
            self.client.insert(&self.table, vec![row.clone()])
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TradeRepository for FlatTradeMapper {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn persist(&self, trade: &TradeAggregate) -> StoreResult<TradeAggregate> {
        trade.validate()?;
        let stamp = self.clock.stamp();
        self.append("olap_flat.insert", to_row(trade, &stamp)).await?;

        debug!(
            trade_id = %trade.trade_id(),
            version = stamp.version,
            write_id = %stamp.write_id,
            periods = trade.periods.len(),
            "Flat trade row appended"
        );
        Ok(trade.clone())
    }

    async fn find_by_trade_id(&self, id: &TradeId) -> StoreResult<Option<TradeAggregate>> {
        let live = select_latest_for_id(self.client.as_ref(), &self.table, &self.retry, id).await?;
        if live.len() > 1 {
            warn!(trade_id = %id, rows = live.len(), "Several flat rows share the latest write");
        }
        live.first().map(|row| from_row(&self.table, row)).transpose()
    }

    async fn search_by_criteria(&self, criteria: &SearchCriteria) -> StoreResult<Vec<TradeAggregate>> {
        criteria.validate()?;
        let filter = criteria::columnar::compile(criteria);
        debug!(table = %self.table, filter = %filter.to_sql(), "Selecting flat trades");

        let live = select_live(self.client.as_ref(), &self.table, &self.retry, &filter).await?;
        let mut trades = live
            .iter()
            .map(|row| from_row(&self.table, row))
            .collect::<StoreResult<Vec<_>>>()?;
        trades.sort_by(|a, b| a.trade_id().cmp(b.trade_id()));
        trades.dedup_by(|a, b| a.trade_id() == b.trade_id());
        Ok(trades)
    }

    async fn delete_by_trade_id(&self, id: &TradeId) -> StoreResult<()> {
        let stamp = self.clock.stamp();
        self.append("olap_flat.tombstone", tombstone_row(id, &stamp)).await?;
        info!(trade_id = %id, version = stamp.version, "Flat trade tombstoned");
        Ok(())
    }
}

#[async_trait]
impl AnalyticalTradeMapper for FlatTradeMapper {
    fn layout(&self) -> OlapLayout {
        OlapLayout::Flat
    }

    async fn find_periods(&self, query: &PeriodQuery) -> StoreResult<Vec<PeriodRecord>> {
        query.criteria.validate()?;
        let filter = criteria::columnar::compile_period_query_flat(query);
        debug!(table = %self.table, filter = %filter.to_sql(), "Pruning flat trades for period query");

        let live = select_live(self.client.as_ref(), &self.table, &self.retry, &filter).await?;
        let mut records = Vec::new();
        for row in &live {
            let trade = from_row(&self.table, row)?;
            let trade_id = trade.trade_id().clone();
            records.extend(
                trade
                    .periods
                    .into_iter()
                    .enumerate()
                    .filter(|(_, period)| query.matches_period(period))
                    .map(|(position, period)| PeriodRecord {
                        trade_id: trade_id.clone(),
                        position,
                        period,
                    }),
            );
        }
        records.sort_by(|a, b| (&a.trade_id, a.position).cmp(&(&b.trade_id, b.position)));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::MemoryColumnarClient;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use trade_domain::TradeHeader;

    fn ts(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 0, 0, 0).unwrap()
    }

    fn trade(id: &str, periods: Vec<TradePeriod>) -> TradeAggregate {
        TradeAggregate::new(
            TradeHeader {
                trade_id: TradeId::new(id).unwrap(),
                business_unit: "BU".into(),
                market: "DE".into(),
                trader_name: "alice".into(),
                agreement_id: "AG".into(),
                commodity: "POWER".into(),
                transaction_type: "BUY".into(),
                reference_zone: "Z".into(),
                trade_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                trade_timestamp: ts(1, 1),
            },
            periods,
        )
    }

    fn mapper() -> (Arc<MemoryColumnarClient>, FlatTradeMapper) {
        let client = Arc::new(MemoryColumnarClient::new());
        let mapper = FlatTradeMapper::new(client.clone(), "trades_flat").with_retry(RetryConfig::none());
        (client, mapper)
    }

    #[test]
    fn test_row_arrays_are_aligned() {
        let t = trade(
            "T-1",
            vec![
                TradePeriod::new(ts(1, 1), ts(1, 2), dec!(10), dec!(1)),
                TradePeriod::new(ts(1, 2), ts(1, 3), dec!(20), dec!(2)).with_reference_zone("AT"),
            ],
        );
        let row = to_row(&t, &WriteStamp::new(7, "w"));
        assert_eq!(
            row.get(col::PERIOD_REFERENCE_ZONES),
            Some(&ColumnValue::Array(vec![ColumnValue::Null, ColumnValue::Text("AT".into())]))
        );
        assert_eq!(from_row("trades_flat", &row).unwrap(), t);
    }

    #[test]
    fn test_ragged_arrays_are_schema_mismatch() {
        let t = trade("T-1", vec![TradePeriod::new(ts(1, 1), ts(1, 2), dec!(10), dec!(1))]);
        let mut row = to_row(&t, &WriteStamp::new(1, "w"));
        row.set(col::PERIOD_PRICES, ColumnValue::Array(vec![]));

        match from_row("trades_flat", &row) {
            Err(StoreError::SchemaMismatch { source_name, reason }) => {
                assert_eq!(source_name, "trades_flat");
                assert!(reason.contains("unequal length"));
            },
            other => panic!("Expected SchemaMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replace_keeps_only_latest_version() {
        let (client, mapper) = mapper();
        let jan = trade(
            "T-1",
            vec![
                TradePeriod::new(ts(1, 1), ts(1, 2), dec!(10), dec!(1)),
                TradePeriod::new(ts(1, 2), ts(1, 3), dec!(10), dec!(1)),
            ],
        );
        let feb = jan.clone().with_periods(vec![TradePeriod::new(ts(2, 1), ts(2, 2), dec!(5), dec!(2))]);

        mapper.persist(&jan).await.unwrap();
        mapper.persist(&feb).await.unwrap();

        assert_eq!(client.row_count("trades_flat"), 2);
        assert_eq!(mapper.find_by_trade_id(jan.trade_id()).await.unwrap(), Some(feb));
    }

    #[tokio::test]
    async fn test_period_query_checks_same_element() {
        let (_, mapper) = mapper();
        // January start with a small quantity, February start with a large one
        let t = trade(
            "T-1",
            vec![
                TradePeriod::new(ts(1, 10), ts(1, 11), dec!(1), dec!(1)),
                TradePeriod::new(ts(2, 10), ts(2, 11), dec!(100), dec!(1)),
            ],
        );
        mapper.persist(&t).await.unwrap();

        let january_large = PeriodQuery::new()
            .starting_between(ts(1, 1), ts(2, 1))
            .quantity_above(dec!(50));
        assert!(mapper.find_periods(&january_large).await.unwrap().is_empty());

        let large = PeriodQuery::new().quantity_above(dec!(50));
        let found = mapper.find_periods(&large).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].position, 1);
    }

    #[tokio::test]
    async fn test_version_tie_reads_one_writer() {
        let (client, mapper) = mapper();
        let first = trade("TIE", vec![TradePeriod::new(ts(1, 1), ts(1, 2), dec!(10), dec!(1))]);
        let second = first.clone().with_periods(vec![]);

        client
            .insert_raw(
                "trades_flat",
                vec![to_row(&first, &WriteStamp::new(42, "writer-a")), to_row(&second, &WriteStamp::new(42, "writer-b"))],
            )
            .unwrap();

        assert_eq!(mapper.find_by_trade_id(first.trade_id()).await.unwrap(), Some(second.clone()));
        assert_eq!(mapper.search_by_criteria(&SearchCriteria::new()).await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn test_delete_appends_tombstone() {
        let (client, mapper) = mapper();
        let t = trade("T-1", vec![TradePeriod::new(ts(1, 1), ts(1, 2), dec!(10), dec!(1))]);
        mapper.persist(&t).await.unwrap();
        mapper.delete_by_trade_id(t.trade_id()).await.unwrap();

        assert_eq!(client.row_count("trades_flat"), 2);
        assert!(mapper.find_by_trade_id(t.trade_id()).await.unwrap().is_none());
        assert!(mapper.search_by_criteria(&SearchCriteria::new()).await.unwrap().is_empty());
        assert!(mapper.find_periods(&PeriodQuery::new()).await.unwrap().is_empty());
    }
}

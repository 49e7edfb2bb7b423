//! PostgreSQL mapper for the trade aggregate.
//!
//! The header lives in `trades`, periods in `trade_periods` keyed by
//! `(trade_id, seq)`. An upsert rewrites the whole period collection inside
//! one unit of work: header upsert first (it takes the row lock that
//! serialises concurrent writers of the same id), then delete, then insert.
//!
//! Uses dynamic queries (`sqlx::query`) instead of compile-time checked
//! macros so the crate builds without `DATABASE_URL`.

use super::unit_of_work::UnitOfWork;
use crate::criteria::sql::{self, SqlParam};
use crate::error::{StoreError, StoreResult};
use crate::repository::TradeRepository;
use crate::retry::{with_retry, RetryConfig};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::{debug, info};
use trade_domain::{SearchCriteria, TradeAggregate, TradeHeader, TradeId, TradePeriod};

const BACKEND: &str = "relational";
const TABLE: &str = "trades";

/// Bind parameters per inserted period row
const PERIOD_COLUMNS: usize = 7;
/// Rows per multi-row insert, keeping under PostgreSQL's 65535 bind limit
const PERIOD_BATCH: usize = 65_535 / PERIOD_COLUMNS;

const SELECT_HEADER: &str = r#"
    SELECT trade_id, business_unit, market, trader_name, agreement_id,
           commodity, transaction_type, reference_zone, trade_date, trade_timestamp
    FROM trades
"#;

const UPSERT_HEADER: &str = r#"
    INSERT INTO trades (
        trade_id, business_unit, market, trader_name, agreement_id,
        commodity, transaction_type, reference_zone, trade_date, trade_timestamp,
        updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
    ON CONFLICT (trade_id) DO UPDATE SET
        business_unit = EXCLUDED.business_unit,
        market = EXCLUDED.market,
        trader_name = EXCLUDED.trader_name,
        agreement_id = EXCLUDED.agreement_id,
        commodity = EXCLUDED.commodity,
        transaction_type = EXCLUDED.transaction_type,
        reference_zone = EXCLUDED.reference_zone,
        trade_date = EXCLUDED.trade_date,
        trade_timestamp = EXCLUDED.trade_timestamp,
        updated_at = EXCLUDED.updated_at
"#;

#[derive(Debug, FromRow)]
struct TradeRow {
    trade_id: String,
    business_unit: String,
    market: String,
    trader_name: String,
    agreement_id: String,
    commodity: String,
    transaction_type: String,
    reference_zone: String,
    trade_date: NaiveDate,
    trade_timestamp: DateTime<Utc>,
}

impl TryFrom<TradeRow> for TradeHeader {
    type Error = StoreError;

    fn try_from(row: TradeRow) -> StoreResult<Self> {
        Ok(TradeHeader {
            trade_id: TradeId::new(row.trade_id)
                .map_err(|e| StoreError::schema_mismatch(TABLE, e.to_string()))?,
            business_unit: row.business_unit,
            market: row.market,
            trader_name: row.trader_name,
            agreement_id: row.agreement_id,
            commodity: row.commodity,
            transaction_type: row.transaction_type,
            reference_zone: row.reference_zone,
            trade_date: row.trade_date,
            trade_timestamp: row.trade_timestamp,
        })
    }
}

#[derive(Debug, FromRow)]
struct PeriodRow {
    trade_id: String,
    seq: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    quantity: Decimal,
    price: Decimal,
    reference_zone: Option<String>,
}

/// Turn `seq`-ordered rows of one trade into periods, rejecting gaps
fn assemble_periods(trade_id: &str, rows: Vec<PeriodRow>) -> StoreResult<Vec<TradePeriod>> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            if usize::try_from(row.seq).ok() != Some(i) {
                return Err(StoreError::schema_mismatch(
                    "trade_periods",
                    format!("trade {} expected seq {}, found {}", trade_id, i, row.seq),
                ));
            }
            Ok(TradePeriod {
                start: row.start_time,
                end: row.end_time,
                quantity: row.quantity,
                price: row.price,
                reference_zone: row.reference_zone,
            })
        })
        .collect()
}

/// Relational mapper over a PostgreSQL pool
pub struct PgTradeMapper {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgTradeMapper {
    /// Create a mapper over `pool`
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Write header and periods, replacing any previous periods
    ///
    /// Returns header rows plus period rows written.
    pub async fn upsert(&self, trade: &TradeAggregate) -> StoreResult<u64> {
        trade.validate()?;
        let written = with_retry(&self.retry, "relational.upsert", || self.upsert_once(trade)).await?;
        debug!(
            trade_id = %trade.trade_id(),
            rows = written,
            periods = trade.periods.len(),
            "Trade upserted"
        );
        Ok(written)
    }

    async fn upsert_once(&self, trade: &TradeAggregate) -> StoreResult<u64> {
        if i32::try_from(trade.periods.len()).is_err() {
            return Err(StoreError::backend(BACKEND, "period count exceeds seq range"));
        }
        let mut unit = UnitOfWork::begin(&self.pool, "trade.upsert").await?;
        let h = &trade.header;
        let id = h.trade_id.as_str();

        let header_rows = sqlx::query(UPSERT_HEADER)
            .bind(id)
            .bind(&h.business_unit)
            .bind(&h.market)
            .bind(&h.trader_name)
            .bind(&h.agreement_id)
            .bind(&h.commodity)
            .bind(&h.transaction_type)
            .bind(&h.reference_zone)
            .bind(h.trade_date)
            .bind(h.trade_timestamp)
            .execute(unit.conn()?)
            .await?
            .rows_affected();

        let replaced = sqlx::query("DELETE FROM trade_periods WHERE trade_id = $1")
            .bind(id)
            .execute(unit.conn()?)
            .await?
            .rows_affected();

        let mut period_rows = 0;
        for (batch, chunk) in trade.periods.chunks(PERIOD_BATCH).enumerate() {
            period_rows += insert_periods(unit.conn()?, id, batch * PERIOD_BATCH, chunk).await?;
        }

        unit.commit().await?;
        debug!(trade_id = %id, replaced, inserted = period_rows, "Periods rewritten");
        Ok(header_rows + period_rows)
    }

    /// Header and periods read from one snapshot
    pub async fn find_by_trade_id(&self, id: &TradeId) -> StoreResult<Option<TradeAggregate>> {
        with_retry(&self.retry, "relational.find", || self.find_once(id)).await
    }

    async fn find_once(&self, id: &TradeId) -> StoreResult<Option<TradeAggregate>> {
        let mut unit = UnitOfWork::begin_read_only(&self.pool, "trade.find").await?;

        let header = sqlx::query_as::<_, TradeRow>(&format!("{} WHERE trade_id = $1", SELECT_HEADER))
            .bind(id.as_str())
            .fetch_optional(unit.conn()?)
            .await?;
        let Some(header) = header else {
            unit.commit().await?;
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, PeriodRow>(
            r#"
            SELECT trade_id, seq, start_time, end_time, quantity, price, reference_zone
            FROM trade_periods
            WHERE trade_id = $1
            ORDER BY seq
            "#,
        )
        .bind(id.as_str())
        .fetch_all(unit.conn()?)
        .await?;
        unit.commit().await?;

        let periods = assemble_periods(id.as_str(), rows)?;
        Ok(Some(TradeAggregate::new(TradeHeader::try_from(header)?, periods)))
    }

    /// Trades whose header matches the criteria, ordered by trade id
    pub async fn find_by_criteria(&self, criteria: &SearchCriteria) -> StoreResult<Vec<TradeAggregate>> {
        criteria.validate()?;
        with_retry(&self.retry, "relational.search", || self.search_once(criteria)).await
    }

    async fn search_once(&self, criteria: &SearchCriteria) -> StoreResult<Vec<TradeAggregate>> {
        let filter = sql::compile(criteria, 1);
        let statement = format!("{} WHERE {} ORDER BY trade_id", SELECT_HEADER, filter.clause);
        debug!(clause = %filter.clause, params = filter.params.len(), "Searching trades");

        let mut unit = UnitOfWork::begin_read_only(&self.pool, "trade.search").await?;

        let mut query = sqlx::query_as::<_, TradeRow>(&statement);
        for param in &filter.params {
            query = match param {
                SqlParam::Text(v) => query.bind(v.as_str()),
                SqlParam::Date(d) => query.bind(*d),
                SqlParam::Timestamp(t) => query.bind(*t),
            };
        }
        let headers = query.fetch_all(unit.conn()?).await?;
        if headers.is_empty() {
            unit.commit().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<String> = headers.iter().map(|h| h.trade_id.clone()).collect();
        let period_rows = sqlx::query_as::<_, PeriodRow>(
            r#"
            SELECT trade_id, seq, start_time, end_time, quantity, price, reference_zone
            FROM trade_periods
            WHERE trade_id = ANY($1)
            ORDER BY trade_id, seq
            "#,
        )
        .bind(&ids)
        .fetch_all(unit.conn()?)
        .await?;
        unit.commit().await?;

        let mut by_trade: HashMap<String, Vec<PeriodRow>> = HashMap::new();
        for row in period_rows {
            by_trade.entry(row.trade_id.clone()).or_default().push(row);
        }

        headers
            .into_iter()
            .map(|header| {
                let rows = by_trade.remove(&header.trade_id).unwrap_or_default();
                let periods = assemble_periods(&header.trade_id, rows)?;
                Ok(TradeAggregate::new(TradeHeader::try_from(header)?, periods))
            })
            .collect()
    }

    /// Remove periods and header in one unit; returns header rows removed
    pub async fn delete_by_trade_id(&self, id: &TradeId) -> StoreResult<u64> {
        let removed = with_retry(&self.retry, "relational.delete", || self.delete_once(id)).await?;
        info!(trade_id = %id, removed, "Trade deleted");
        Ok(removed)
    }

    async fn delete_once(&self, id: &TradeId) -> StoreResult<u64> {
        let mut unit = UnitOfWork::begin(&self.pool, "trade.delete").await?;
        sqlx::query("DELETE FROM trade_periods WHERE trade_id = $1")
            .bind(id.as_str())
            .execute(unit.conn()?)
            .await?;
        let removed = sqlx::query("DELETE FROM trades WHERE trade_id = $1")
            .bind(id.as_str())
            .execute(unit.conn()?)
            .await?
            .rows_affected();
        unit.commit().await?;
        Ok(removed)
    }
}

async fn insert_periods(
    conn: &mut PgConnection,
    trade_id: &str,
    first_seq: usize,
    periods: &[TradePeriod],
) -> StoreResult<u64> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO trade_periods (trade_id, seq, start_time, end_time, quantity, price, reference_zone) ",
    );
    builder.push_values(periods.iter().enumerate(), |mut row, (offset, period)| {
        row.push_bind(trade_id)
            .push_bind((first_seq + offset) as i32)
            .push_bind(period.start)
            .push_bind(period.end)
            .push_bind(period.quantity)
            .push_bind(period.price)
            .push_bind(period.reference_zone.as_deref());
    });

    Ok(builder.build().execute(conn).await?.rows_affected())
}

#[async_trait]
impl TradeRepository for PgTradeMapper {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn persist(&self, trade: &TradeAggregate) -> StoreResult<TradeAggregate> {
        self.upsert(trade).await?;
        Ok(trade.clone())
    }

    async fn find_by_trade_id(&self, id: &TradeId) -> StoreResult<Option<TradeAggregate>> {
        PgTradeMapper::find_by_trade_id(self, id).await
    }

    async fn search_by_criteria(&self, criteria: &SearchCriteria) -> StoreResult<Vec<TradeAggregate>> {
        self.find_by_criteria(criteria).await
    }

    async fn delete_by_trade_id(&self, id: &TradeId) -> StoreResult<()> {
        PgTradeMapper::delete_by_trade_id(self, id).await?;
        Ok(())
    }
}

//! Integration tests for the flat and fact analytical layouts.
//!
//! Every scenario runs against both layouts; the two must be
//! indistinguishable through the repository contract.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;
use trade_domain::{CriteriaField, SearchCriteria, TradeAggregate, TradeId};
use trade_store::columnar::{col, ColumnRow, ColumnValue};
use trade_store::{
    AnalyticalTradeMapper, ErrorKind, FactTradeMapper, FlatTradeMapper, MemoryColumnarClient, OlapLayout,
    PeriodQuery, RetryConfig, TradeRepository,
};
use trade_testkit::{
    de_fr_trades, header, init_tracing, january_2024, period, sample_trade, t100_february, t100_january,
    utc, T100,
};

struct Layout {
    client: Arc<MemoryColumnarClient>,
    mapper: Arc<dyn AnalyticalTradeMapper>,
}

fn flat() -> Layout {
    init_tracing();
    let client = Arc::new(MemoryColumnarClient::new());
    let mapper = FlatTradeMapper::new(client.clone(), "trades_flat").with_retry(RetryConfig::immediate(3));
    Layout {
        client,
        mapper: Arc::new(mapper),
    }
}

fn fact() -> Layout {
    init_tracing();
    let client = Arc::new(MemoryColumnarClient::new());
    let mapper = FactTradeMapper::new(client.clone(), "trade_period_facts").with_retry(RetryConfig::immediate(3));
    Layout {
        client,
        mapper: Arc::new(mapper),
    }
}

fn layouts() -> Vec<Layout> {
    vec![flat(), fact()]
}

fn jan1() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn empty_trade(id: &str) -> TradeAggregate {
    TradeAggregate::new(header(id, "FR", jan1()), vec![])
}

fn ids(trades: &[TradeAggregate]) -> Vec<String> {
    let mut ids: Vec<String> = trades.iter().map(|t| t.trade_id().to_string()).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_t100_replace_scenario() -> anyhow::Result<()> {
    for Layout { mapper, .. } in layouts() {
        let layout = mapper.layout();
        mapper.persist(&t100_january()).await?;
        mapper.persist(&t100_february()).await?;

        let found = mapper.find_by_trade_id(&TradeId::new(T100)?).await?;
        assert_eq!(found, Some(t100_february()), "{:?}", layout);

        let (from, to) = january_2024();
        let january = mapper.find_periods(&PeriodQuery::new().starting_between(from, to)).await?;
        assert!(january.is_empty(), "{:?} returned stale January periods", layout);

        let february = mapper
            .find_periods(&PeriodQuery::new().starting_between(utc(2024, 2, 1), utc(2024, 3, 1)))
            .await?;
        assert_eq!(february.len(), 1, "{:?}", layout);
        assert_eq!(february[0].position, 0);
        assert_eq!(february[0].period, t100_february().periods[0]);
    }
    Ok(())
}

#[tokio::test]
async fn test_designs_reconstruct_identically() -> anyhow::Result<()> {
    let flat = flat();
    let fact = fact();

    let mut trades = de_fr_trades();
    trades.push(t100_january());
    trades.push(empty_trade("EMPTY-1"));

    for trade in &trades {
        flat.mapper.persist(trade).await?;
        fact.mapper.persist(trade).await?;
    }
    // Replace one and delete another on both sides
    flat.mapper.persist(&t100_february()).await?;
    fact.mapper.persist(&t100_february()).await?;
    flat.mapper.delete_by_trade_id(&TradeId::new("FR-1")?).await?;
    fact.mapper.delete_by_trade_id(&TradeId::new("FR-1")?).await?;

    for trade in &trades {
        let from_flat = flat.mapper.find_by_trade_id(trade.trade_id()).await?;
        let from_fact = fact.mapper.find_by_trade_id(trade.trade_id()).await?;
        assert_eq!(from_flat, from_fact, "trade {}", trade.trade_id());
    }

    let criteria = SearchCriteria::new().market("DE");
    let mut flat_found = flat.mapper.search_by_criteria(&criteria).await?;
    let mut fact_found = fact.mapper.search_by_criteria(&criteria).await?;
    flat_found.sort_by(|a, b| a.trade_id().cmp(b.trade_id()));
    fact_found.sort_by(|a, b| a.trade_id().cmp(b.trade_id()));
    assert_eq!(flat_found, fact_found);

    let query = PeriodQuery::new().quantity_above(dec!(50));
    assert_eq!(flat.mapper.find_periods(&query).await?, fact.mapper.find_periods(&query).await?);

    // Physical shapes differ: one row per version vs one row per period
    assert_eq!(flat.client.row_count("trades_flat"), 8);
    assert_eq!(fact.client.row_count("trade_period_facts"), 13);
    Ok(())
}

#[tokio::test]
async fn test_tombstones_hide_every_read_path() -> anyhow::Result<()> {
    for Layout { mapper, .. } in layouts() {
        let trade = sample_trade("T-1", "DE", jan1());
        mapper.persist(&trade).await?;
        mapper.delete_by_trade_id(trade.trade_id()).await?;
        mapper.delete_by_trade_id(trade.trade_id()).await?;

        assert!(mapper.find_by_trade_id(trade.trade_id()).await?.is_none());
        assert!(mapper.search_by_criteria(&SearchCriteria::new()).await?.is_empty());
        assert!(mapper.find_periods(&PeriodQuery::new()).await?.is_empty());

        // A later persist resurrects the id with only the new periods
        let revived = trade.clone().with_periods(vec![period(utc(2024, 5, 1), utc(2024, 5, 2), dec!(7), dec!(7))]);
        mapper.persist(&revived).await?;
        assert_eq!(mapper.find_by_trade_id(trade.trade_id()).await?, Some(revived));
    }
    Ok(())
}

#[tokio::test]
async fn test_market_and_date_search() -> anyhow::Result<()> {
    for Layout { mapper, .. } in layouts() {
        for trade in de_fr_trades() {
            mapper.persist(&trade).await?;
        }

        let found = mapper
            .search_by_criteria(&SearchCriteria::new().market("DE").trade_date(jan1()))
            .await?;
        assert_eq!(ids(&found), vec!["DE-1", "DE-2"], "{:?}", mapper.layout());
    }
    Ok(())
}

#[tokio::test]
async fn test_search_ignores_superseded_versions() -> anyhow::Result<()> {
    for Layout { mapper, .. } in layouts() {
        let trade = sample_trade("MOVER", "DE", jan1());
        mapper.persist(&trade).await?;

        let mut moved = trade.clone();
        moved.header.market = "FR".to_string();
        mapper.persist(&moved).await?;

        let de = mapper.search_by_criteria(&SearchCriteria::new().market("DE")).await?;
        let fr = mapper.search_by_criteria(&SearchCriteria::new().market("FR")).await?;
        assert!(de.is_empty(), "{:?} matched an old version", mapper.layout());
        assert_eq!(fr, vec![moved.clone()]);
    }
    Ok(())
}

#[tokio::test]
async fn test_removing_a_predicate_never_narrows() -> anyhow::Result<()> {
    let full = SearchCriteria::new()
        .market("DE")
        .trade_date(jan1())
        .commodity("POWER")
        .trader_name("alice")
        .traded_between(utc(2024, 1, 1), utc(2024, 1, 3));

    for Layout { mapper, .. } in layouts() {
        for trade in de_fr_trades() {
            mapper.persist(&trade).await?;
        }

        let narrow = ids(&mapper.search_by_criteria(&full).await?);
        for field in CriteriaField::ALL {
            let wider = ids(&mapper.search_by_criteria(&full.clone().without(field)).await?);
            assert!(
                narrow.iter().all(|id| wider.contains(id)),
                "{:?}: dropping {:?} lost results",
                mapper.layout(),
                field
            );
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_period_query_combines_header_and_period_predicates() -> anyhow::Result<()> {
    for Layout { mapper, .. } in layouts() {
        for trade in de_fr_trades() {
            mapper.persist(&trade).await?;
        }

        // Every fixture trade has a 100 and an 80.5 period starting in March
        let query = PeriodQuery::new()
            .with_criteria(SearchCriteria::new().market("FR"))
            .starting_between(utc(2024, 3, 1), utc(2024, 4, 1))
            .quantity_above(dec!(90));
        let found = mapper.find_periods(&query).await?;

        assert_eq!(found.len(), 1, "{:?}", mapper.layout());
        assert_eq!(found[0].trade_id.as_str(), "FR-1");
        assert_eq!(found[0].position, 0);
        assert_eq!(found[0].period.quantity, dec!(100));
    }
    Ok(())
}

#[tokio::test]
async fn test_ragged_flat_row_is_schema_mismatch() -> anyhow::Result<()> {
    let Layout { client, mapper } = flat();
    assert_eq!(mapper.layout(), OlapLayout::Flat);

    let row = ColumnRow::new()
        .with(col::TRADE_ID, "RAGGED")
        .with(col::BUSINESS_UNIT, "BU")
        .with(col::MARKET, "DE")
        .with(col::TRADER_NAME, "alice")
        .with(col::AGREEMENT_ID, "AG")
        .with(col::COMMODITY, "POWER")
        .with(col::TRANSACTION_TYPE, "BUY")
        .with(col::REFERENCE_ZONE, "Z")
        .with(col::TRADE_DATE, jan1())
        .with(col::TRADE_TIMESTAMP, utc(2024, 1, 1))
        .with(col::VERSION, 1_i64)
        .with(col::WRITE_ID, "w-1")
        .with(col::IS_DELETED, 0_i64)
        .with(col::PERIOD_STARTS, ColumnValue::Array(vec![ColumnValue::DateTime(utc(2024, 1, 1))]))
        .with(col::PERIOD_ENDS, ColumnValue::Array(vec![ColumnValue::DateTime(utc(2024, 1, 2))]))
        .with(col::PERIOD_QUANTITIES, ColumnValue::Array(vec![ColumnValue::Decimal(dec!(1))]))
        .with(col::PERIOD_PRICES, ColumnValue::Array(vec![]))
        .with(col::PERIOD_REFERENCE_ZONES, ColumnValue::Array(vec![ColumnValue::Null]));
    client.insert_raw("trades_flat", vec![row])?;

    let err = mapper.find_by_trade_id(&TradeId::new("RAGGED")?).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    Ok(())
}

#[tokio::test]
async fn test_retry_exhaustion_is_backend_unavailable() {
    for Layout { client, mapper } in layouts() {
        client.fail_next(10);

        let err = mapper.persist(&t100_january()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.row_count("trades_flat") + client.row_count("trade_period_facts"), 0);
    }
}

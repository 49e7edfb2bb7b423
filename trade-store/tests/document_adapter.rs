//! Integration tests for the document adapter over the in-memory client.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use trade_domain::{SearchCriteria, TradeId};
use trade_store::{
    DocumentClient, DocumentTradeAdapter, ErrorKind, MemoryDocumentClient, RetryConfig, StoreError,
    TradeRepository,
};
use trade_testkit::{
    de_fr_trades, init_tracing, period, sample_trade, t100_february, t100_january, utc, T100,
};

const TABLE: &str = "trades";

fn adapter() -> (Arc<MemoryDocumentClient>, DocumentTradeAdapter) {
    init_tracing();
    let client = Arc::new(MemoryDocumentClient::new());
    let adapter = DocumentTradeAdapter::new(client.clone(), TABLE).with_retry(RetryConfig::immediate(3));
    (client, adapter)
}

fn jan1() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

#[tokio::test]
async fn test_round_trip_preserves_period_order() -> anyhow::Result<()> {
    let (_, adapter) = adapter();
    let trade = sample_trade("T-1", "DE", jan1());

    adapter.persist(&trade).await?;
    let found = adapter.find_by_trade_id(trade.trade_id()).await?;

    assert_eq!(found, Some(trade));
    Ok(())
}

#[tokio::test]
async fn test_replace_drops_stale_periods() -> anyhow::Result<()> {
    let (client, adapter) = adapter();

    adapter.persist(&t100_january()).await?;
    adapter.persist(&t100_february()).await?;

    let found = adapter
        .find_by_trade_id(&TradeId::new(T100)?)
        .await?
        .expect("T-100 should exist");
    assert_eq!(found.periods, t100_february().periods);
    assert_eq!(client.item_count(TABLE), 1);
    Ok(())
}

#[tokio::test]
async fn test_delete_is_complete_and_idempotent() -> anyhow::Result<()> {
    let (client, adapter) = adapter();
    let trade = sample_trade("T-1", "DE", jan1());
    adapter.persist(&trade).await?;

    adapter.delete_by_trade_id(trade.trade_id()).await?;
    adapter.delete_by_trade_id(trade.trade_id()).await?;

    assert!(adapter.find_by_trade_id(trade.trade_id()).await?.is_none());
    assert!(adapter.search_by_criteria(&SearchCriteria::new()).await?.is_empty());
    assert_eq!(client.item_count(TABLE), 0);
    Ok(())
}

#[tokio::test]
async fn test_market_and_date_search() -> anyhow::Result<()> {
    let (_, adapter) = adapter();
    for trade in de_fr_trades() {
        adapter.persist(&trade).await?;
    }

    let found = adapter
        .search_by_criteria(&SearchCriteria::new().market("DE").trade_date(jan1()))
        .await?;
    let ids: Vec<&str> = found.iter().map(|t| t.trade_id().as_str()).collect();

    assert_eq!(ids, vec!["DE-1", "DE-2"]);
    Ok(())
}

#[tokio::test]
async fn test_timestamp_range_is_half_open() -> anyhow::Result<()> {
    let (_, adapter) = adapter();
    for trade in de_fr_trades() {
        adapter.persist(&trade).await?;
    }

    // Fixture trades are stamped 09:30 on their trade date
    let jan1_trades = adapter
        .search_by_criteria(&SearchCriteria::new().traded_between(utc(2024, 1, 1), utc(2024, 1, 2)))
        .await?;
    let from_jan2 = adapter
        .search_by_criteria(&SearchCriteria::new().traded_from(utc(2024, 1, 2)))
        .await?;
    let empty_window = adapter
        .search_by_criteria(&SearchCriteria::new().traded_between(utc(2024, 1, 1), utc(2024, 1, 1)))
        .await?;

    assert_eq!(jan1_trades.len(), 3);
    assert_eq!(from_jan2.len(), 1);
    assert!(empty_window.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_conditional_save_detects_concurrent_writer() -> anyhow::Result<()> {
    let (_, adapter) = adapter();
    let trade = t100_january();

    let first = adapter.save_if_revision(&trade, None).await?;
    let create_again = adapter.save_if_revision(&trade, None).await;
    assert!(matches!(create_again, Err(StoreError::Conflict { .. })));

    let second = adapter.save_if_revision(&t100_february(), Some(first)).await?;
    assert!(second > first);

    let stale = adapter.save_if_revision(&trade, Some(first)).await;
    assert_eq!(stale.unwrap_err().kind(), ErrorKind::Conflict);

    let (stored, revision) = adapter
        .find_with_revision(trade.trade_id())
        .await?
        .expect("trade should exist");
    assert_eq!(revision, second);
    assert_eq!(stored, t100_february());
    Ok(())
}

#[tokio::test]
async fn test_transient_failures_are_retried() -> anyhow::Result<()> {
    let (client, adapter) = adapter();
    client.fail_next(2);

    adapter.persist(&t100_january()).await?;

    assert_eq!(client.call_count(), 3);
    assert_eq!(client.item_count(TABLE), 1);
    Ok(())
}

#[tokio::test]
async fn test_retry_exhaustion_is_backend_unavailable() {
    let (client, adapter) = adapter();
    client.fail_next(10);

    let err = adapter.persist(&t100_january()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(err.to_string().contains("gave up after 3 attempts"));
    assert_eq!(client.call_count(), 3);
}

#[tokio::test]
async fn test_validation_happens_before_any_call() {
    let (client, adapter) = adapter();
    let broken = t100_january().with_periods(vec![period(utc(2024, 1, 5), utc(2024, 1, 1), dec!(1), dec!(1))]);

    let err = adapter.persist(&broken).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let inverted = SearchCriteria::new().traded_between(utc(2024, 2, 1), utc(2024, 1, 1));
    let err = adapter.search_by_criteria(&inverted).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_document_is_schema_mismatch() -> anyhow::Result<()> {
    let (client, adapter) = adapter();
    let item = json!({ "tradeId": "BROKEN", "market": "DE", "periods": "not a list" });
    client.insert_raw(TABLE, "BROKEN", item.as_object().cloned().unwrap())?;

    let err = adapter
        .find_by_trade_id(&TradeId::new("BROKEN")?)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    Ok(())
}

#[tokio::test]
async fn test_stored_layout_is_one_item_per_trade() -> anyhow::Result<()> {
    let (client, adapter) = adapter();
    adapter.persist(&t100_january()).await?;

    let item = client.get_item(TABLE, T100).await?.expect("item should exist");
    assert_eq!(item["tradeId"], json!(T100));
    assert_eq!(item["periods"].as_array().map(Vec::len), Some(2));
    assert!(item["revision"].is_i64());
    Ok(())
}

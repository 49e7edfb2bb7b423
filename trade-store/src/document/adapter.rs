//! Trade adapter over a document store.
//!
//! Each trade is one item keyed by `tradeId`, so a save is a full overwrite
//! and no stale period can survive it. Criteria search is a filtered scan;
//! its cost is whatever the backing store charges for a scan.

use super::client::{DocumentClient, PutCondition};
use super::layout::{attr, from_document, to_document};
use crate::criteria;
use crate::error::StoreResult;
use crate::repository::TradeRepository;
use crate::retry::{with_retry, RetryConfig};
use crate::version::VersionClock;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use trade_domain::{SearchCriteria, TradeAggregate, TradeId};

const BACKEND: &str = "document";

/// Document-store implementation of the trade repository
pub struct DocumentTradeAdapter {
    client: Arc<dyn DocumentClient>,
    table: String,
    clock: &'static VersionClock,
    retry: RetryConfig,
}

impl DocumentTradeAdapter {
    /// Create an adapter writing to `table`
    pub fn new(client: Arc<dyn DocumentClient>, table: impl Into<String>) -> Self {
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

    /// Table the adapter writes to
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Unconditional full overwrite (last writer wins)
    pub async fn save(&self, trade: &TradeAggregate) -> StoreResult<TradeAggregate> {
        trade.validate()?;
        let revision = self.clock.next();
        let item = to_document(trade, revision)?;
        let key = trade.trade_id().as_str();

        with_retry(&self.retry, "document.save", || {
            self.client.put_item(&self.table, key, item.clone(), None)
        })
        .await?;

        debug!(
            trade_id = %trade.trade_id(),
            revision,
            periods = trade.periods.len(),
            "Trade document saved"
        );
        Ok(trade.clone())
    }

    /// Overwrite only if the stored revision is still `expected`
    ///
    /// `expected = None` requires that no document exists yet. Returns the
    /// new revision; a moved revision surfaces as `StoreError::Conflict`.
    pub async fn save_if_revision(&self, trade: &TradeAggregate, expected: Option<i64>) -> StoreResult<i64> {
        trade.validate()?;
        let revision = self.clock.next();
        let item = to_document(trade, revision)?;
        let key = trade.trade_id().as_str();
        let condition = match expected {
            None => PutCondition::NotExists,
            Some(r) => PutCondition::AttributeEquals {
                attribute: attr::REVISION.to_string(),
                value: Value::from(r),
            },
        };

        with_retry(&self.retry, "document.save_if_revision", || {
            self.client
                .put_item(&self.table, key, item.clone(), Some(condition.clone()))
        })
        .await?;

        debug!(trade_id = %trade.trade_id(), revision, ?expected, "Trade document saved conditionally");
        Ok(revision)
    }

    /// Find a trade together with its stored revision
    pub async fn find_with_revision(&self, id: &TradeId) -> StoreResult<Option<(TradeAggregate, i64)>> {
        let item = with_retry(&self.retry, "document.get", || {
            self.client.get_item(&self.table, id.as_str())
        })
        .await?;

        item.map(|doc| from_document(&self.table, doc)).transpose()
    }

    /// Find a trade by id
    pub async fn find_by_trade_id(&self, id: &TradeId) -> StoreResult<Option<TradeAggregate>> {
        Ok(self.find_with_revision(id).await?.map(|(trade, _)| trade))
    }

    /// Filtered scan over all trade documents, ordered by trade id
    pub async fn search_by_criteria(&self, criteria: &SearchCriteria) -> StoreResult<Vec<TradeAggregate>> {
        criteria.validate()?;
        let filter = criteria::document::compile(criteria);
        debug!(
            table = %self.table,
            filter = ?filter.expression().map(|e| e.expression),
            "Scanning trade documents"
        );

        let items = with_retry(&self.retry, "document.scan", || {
            self.client.scan(&self.table, &filter)
        })
        .await?;

        let mut trades = items
            .into_iter()
            .map(|doc| from_document(&self.table, doc).map(|(trade, _)| trade))
            .collect::<StoreResult<Vec<_>>>()?;
        trades.sort_by(|a, b| a.trade_id().cmp(b.trade_id()));
        Ok(trades)
    }

    /// Remove the trade document; a missing id is not an error
    pub async fn delete_by_trade_id(&self, id: &TradeId) -> StoreResult<()> {
        with_retry(&self.retry, "document.delete", || {
            self.client.delete_item(&self.table, id.as_str())
        })
        .await?;
        info!(trade_id = %id, "Trade document deleted");
        Ok(())
    }
}

#[async_trait]
impl TradeRepository for DocumentTradeAdapter {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn persist(&self, trade: &TradeAggregate) -> StoreResult<TradeAggregate> {
        self.save(trade).await
    }

    async fn find_by_trade_id(&self, id: &TradeId) -> StoreResult<Option<TradeAggregate>> {
        DocumentTradeAdapter::find_by_trade_id(self, id).await
    }

    async fn search_by_criteria(&self, criteria: &SearchCriteria) -> StoreResult<Vec<TradeAggregate>> {
        DocumentTradeAdapter::search_by_criteria(self, criteria).await
    }

    async fn delete_by_trade_id(&self, id: &TradeId) -> StoreResult<()> {
        DocumentTradeAdapter::delete_by_trade_id(self, id).await
    }
}

//! In-memory columnar client
//!
//! Append-only row storage per table, evaluated with the same filter model
//! the mappers render to SQL. Supports injecting transient failures.

use super::client::{ColumnFilter, ColumnRow, ColumnarClient};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const BACKEND: &str = "columnar";

type Tables = HashMap<String, Vec<ColumnRow>>;

/// In-memory analytical store for testing
#[derive(Default)]
pub struct MemoryColumnarClient {
    tables: RwLock<Tables>,
    failures_pending: AtomicU32,
    calls: AtomicU64,
}

impl MemoryColumnarClient {
    /// Create a new empty client
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls fail with `BackendUnavailable`
    pub fn fail_next(&self, n: u32) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Number of calls received, including failed ones
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Physical rows in a table, superseded versions included
    pub fn row_count(&self, table: &str) -> usize {
        self.read()
            .map(|t| t.get(table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Append rows directly, bypassing call accounting (for test setup)
    pub fn insert_raw(&self, table: &str, rows: Vec<ColumnRow>) -> StoreResult<()> {
        self.write()?.entry(table.to_string()).or_default().extend(rows);
        Ok(())
    }

    fn enter(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::unavailable(BACKEND, "injected transient failure"));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::backend(BACKEND, "lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::backend(BACKEND, "lock poisoned"))
    }
}

#[async_trait]
impl ColumnarClient for MemoryColumnarClient {
    async fn insert(&self, table: &str, rows: Vec<ColumnRow>) -> StoreResult<u64> {
        self.enter()?;
        let written = rows.len() as u64;
        self.write()?.entry(table.to_string()).or_default().extend(rows);
        Ok(written)
    }

    async fn select(&self, table: &str, filter: &ColumnFilter) -> StoreResult<Vec<ColumnRow>> {
        self.enter()?;
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::client::{ColumnPredicate, CompareOp};

    #[tokio::test]
    async fn test_insert_is_append_only() {
        let client = MemoryColumnarClient::new();
        let row = ColumnRow::new().with("trade_id", "T-1").with("version", 1_i64);

        assert_eq!(client.insert("t", vec![row.clone()]).await.unwrap(), 1);
        assert_eq!(client.insert("t", vec![row.with("version", 2_i64)]).await.unwrap(), 1);
        assert_eq!(client.row_count("t"), 2);
    }

    #[tokio::test]
    async fn test_select_filters() {
        let client = MemoryColumnarClient::new();
        client
            .insert(
                "t",
                vec![
                    ColumnRow::new().with("market", "DE"),
                    ColumnRow::new().with("market", "FR"),
                ],
            )
            .await
            .unwrap();

        let de = ColumnFilter::all().and(ColumnPredicate::compare("market", CompareOp::Eq, "DE"));
        assert_eq!(client.select("t", &de).await.unwrap().len(), 1);
        assert_eq!(client.select("t", &ColumnFilter::all()).await.unwrap().len(), 2);
        assert!(client.select("missing", &de).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let client = MemoryColumnarClient::new();
        client.fail_next(1);

        let err = client.insert("t", vec![ColumnRow::new()]).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(client.row_count("t"), 0);
        assert_eq!(client.call_count(), 1);
    }
}

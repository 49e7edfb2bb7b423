//! In-memory document client
//!
//! Used for testing and development without a document store.
//! Thread-safe using RwLock for concurrent access. Supports injecting
//! transient failures so retry paths can be exercised.

use super::client::{Document, DocumentClient, DocumentFilter, PutCondition};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const BACKEND: &str = "document";

type Tables = HashMap<String, HashMap<String, Document>>;

/// In-memory document store for testing
#[derive(Default)]
pub struct MemoryDocumentClient {
    tables: RwLock<Tables>,
    failures_pending: AtomicU32,
    calls: AtomicU64,
}

impl MemoryDocumentClient {
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

    /// Number of items in a table
    pub fn item_count(&self, table: &str) -> usize {
        self.read()
            .map(|t| t.get(table).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    /// Overwrite an item directly, bypassing conditions (for test setup)
    pub fn insert_raw(&self, table: &str, key: &str, item: Document) -> StoreResult<()> {
        self.write()?
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), item);
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
impl DocumentClient for MemoryDocumentClient {
    async fn put_item(
        &self,
        table: &str,
        key: &str,
        item: Document,
        condition: Option<PutCondition>,
    ) -> StoreResult<()> {
        self.enter()?;
        let mut tables = self.write()?;
        let items = tables.entry(table.to_string()).or_default();

        match (&condition, items.get(key)) {
            (None, _) | (Some(PutCondition::NotExists), None) => {},
            (Some(PutCondition::NotExists), Some(_)) => {
                return Err(StoreError::conflict(key, "item already exists"));
            },
            (Some(PutCondition::AttributeEquals { attribute, value }), Some(existing)) => {
                if existing.get(attribute) != Some(value) {
                    return Err(StoreError::conflict(
                        key,
                        format!("{} is {:?}, expected {}", attribute, existing.get(attribute), value),
                    ));
                }
            },
            (Some(PutCondition::AttributeEquals { attribute, .. }), None) => {
                return Err(StoreError::conflict(
                    key,
                    format!("item does not exist, cannot check {}", attribute),
                ));
            },
        }

        items.insert(key.to_string(), item);
        Ok(())
    }

    async fn get_item(&self, table: &str, key: &str) -> StoreResult<Option<Document>> {
        self.enter()?;
        let tables = self.read()?;
        Ok(tables.get(table).and_then(|items| items.get(key)).cloned())
    }

    async fn delete_item(&self, table: &str, key: &str) -> StoreResult<()> {
        self.enter()?;
        let mut tables = self.write()?;
        if let Some(items) = tables.get_mut(table) {
            items.remove(key);
        }
        Ok(())
    }

    async fn scan(&self, table: &str, filter: &DocumentFilter) -> StoreResult<Vec<Document>> {
        self.enter()?;
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .map(|items| items.values().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }
}

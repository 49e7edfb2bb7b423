//! Trade Storage Layer
//!
//! Persists trade aggregates (a header plus ordered periods) on three
//! structurally different backends behind one contract.
//!
//! # Architecture
//!
//! - **Repository traits**: the storage interface (ports)
//! - **Relational mapper**: header + period tables in PostgreSQL (feature `postgres`)
//! - **Document adapter**: one keyed document per trade
//! - **Analytical mappers**: append-only columnar rows in a flat (array) or
//!   fact (row per period) layout
//! - **Facade**: [`TradeStore`], dispatching to the configured backend
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use trade_store::{BackendClients, BackendKind, MemoryDocumentClient, StoreConfig, TradeStore};
//! use trade_domain::SearchCriteria;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = StoreConfig::test().with_backend(BackendKind::Document);
//!     let clients = BackendClients::new().with_document(Arc::new(MemoryDocumentClient::new()));
//!     let store = TradeStore::from_config(&config, clients).unwrap();
//!
//!     let trades = store
//!         .search_by_criteria(&SearchCriteria::new().market("DE"))
//!         .await
//!         .unwrap();
//!     println!("DE trades: {}", trades.len());
//! }
//! ```

#![warn(clippy::all)]

// Modules
pub mod columnar;
mod config;
pub mod criteria;
pub mod document;
mod error;
mod facade;
#[cfg(feature = "postgres")]
pub mod relational;
mod repository;
mod retry;
mod version;

// Re-exports
pub use columnar::{ColumnarClient, FactTradeMapper, FlatTradeMapper, MemoryColumnarClient};
pub use config::{BackendKind, Environment, RetrySettings, StoreConfig, TableConfig};
pub use document::{DocumentClient, DocumentTradeAdapter, MemoryDocumentClient};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use facade::{BackendClients, TradeStore};
#[cfg(feature = "postgres")]
pub use relational::{migrate, PgTradeMapper, UnitOfWork};
pub use repository::{AnalyticalTradeMapper, OlapLayout, PeriodQuery, PeriodRecord, TradeRepository};
pub use retry::{with_retry, RetryConfig};
pub use version::{VersionClock, WriteStamp};

//! Columnar analytical backend.
//!
//! Two interchangeable layouts over an append-only store:
//!
//! - [`FlatTradeMapper`]: one row per trade version, periods as
//!   position-aligned arrays
//! - [`FactTradeMapper`]: one row per (trade version, period), header
//!   repeated on every row
//!
//! Both write a fresh `version` on every persist and a tombstone on delete,
//! and deduplicate on read so results never depend on background merges.

pub mod client;
mod fact;
mod flat;
mod memory;
mod rows;

pub use client::{
    ColumnFilter, ColumnPredicate, ColumnRow, ColumnValue, ColumnarClient, CompareOp, RowReader,
};
pub use fact::{FactTradeMapper, FACT_TABLE_DDL};
pub use flat::{FlatTradeMapper, FLAT_TABLE_DDL};
pub use memory::MemoryColumnarClient;

/// Column names shared by both layouts
pub mod col {
    pub const TRADE_ID: &str = "trade_id";
    pub const BUSINESS_UNIT: &str = "business_unit";
    pub const MARKET: &str = "market";
    pub const TRADER_NAME: &str = "trader_name";
    pub const AGREEMENT_ID: &str = "agreement_id";
    pub const COMMODITY: &str = "commodity";
    pub const TRANSACTION_TYPE: &str = "transaction_type";
    pub const REFERENCE_ZONE: &str = "reference_zone";
    pub const TRADE_DATE: &str = "trade_date";
    pub const TRADE_TIMESTAMP: &str = "trade_timestamp";
    pub const VERSION: &str = "version";
    pub const IS_DELETED: &str = "is_deleted";
    pub const WRITE_ID: &str = "write_id";

    // Flat layout arrays
    pub const PERIOD_STARTS: &str = "period_starts";
    pub const PERIOD_ENDS: &str = "period_ends";
    pub const PERIOD_QUANTITIES: &str = "period_quantities";
    pub const PERIOD_PRICES: &str = "period_prices";
    pub const PERIOD_REFERENCE_ZONES: &str = "period_reference_zones";

    // Fact layout period columns
    pub const PERIOD_INDEX: &str = "period_index";
    pub const PERIOD_COUNT: &str = "period_count";
    pub const PERIOD_START: &str = "period_start";
    pub const PERIOD_END: &str = "period_end";
    pub const PERIOD_QUANTITY: &str = "period_quantity";
    pub const PERIOD_PRICE: &str = "period_price";
    pub const PERIOD_REFERENCE_ZONE: &str = "period_reference_zone";
}

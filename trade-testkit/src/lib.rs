//! Test helpers for trade store tests.
//!
//! Provides trade fixtures (including the T-100 replace scenario) and
//! tracing setup. DB-backed tests get their schema from `#[sqlx::test]`.

mod helpers;

pub use helpers::{
    de_fr_trades, header, january_2024, period, sample_trade, t100_february, t100_january,
    unique_trade_id, utc, T100,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a test-friendly subscriber once; later calls are no-ops.
///
/// Honours `RUST_LOG`, defaulting to `trade_store=debug`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trade_store=debug"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(filter)
        .try_init();
}

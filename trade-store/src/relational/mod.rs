//! Normalized PostgreSQL backend (feature `postgres`).

mod mapper;
mod unit_of_work;

pub use mapper::PgTradeMapper;
pub use unit_of_work::UnitOfWork;

use crate::error::{StoreError, StoreResult};
use sqlx::PgPool;
use tracing::info;

/// Apply the bundled schema migrations
pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("../migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::backend("relational", format!("migration failed: {}", e)))?;
    info!("Trade schema migrations applied");
    Ok(())
}

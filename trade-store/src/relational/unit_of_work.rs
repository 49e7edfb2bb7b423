//! Explicit transaction boundary.
//!
//! A unit commits only through [`UnitOfWork::commit`]. Every other exit,
//! including `?` on an error and a dropped future, rolls back.

use crate::error::{StoreError, StoreResult};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

/// One database transaction
pub struct UnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
    label: &'static str,
}

impl UnitOfWork {
    /// Begin a read-write unit
    pub async fn begin(pool: &PgPool, label: &'static str) -> StoreResult<Self> {
        let tx = pool.begin().await?;
        debug!(unit = label, "Unit of work started");
        Ok(Self { tx: Some(tx), label })
    }

    /// Begin a read-only unit with a single snapshot for all its statements
    pub async fn begin_read_only(pool: &PgPool, label: &'static str) -> StoreResult<Self> {
        let mut unit = Self::begin(pool, label).await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(unit.conn()?)
            .await?;
        Ok(unit)
    }

    /// Connection to run statements on
    pub fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| StoreError::backend("relational", "unit of work already finished"))
    }

    /// Commit and consume the unit
    pub async fn commit(mut self) -> StoreResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            debug!(unit = self.label, "Unit of work committed");
        }
        Ok(())
    }

    /// Roll back explicitly and consume the unit
    pub async fn rollback(mut self) -> StoreResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!(unit = self.label, "Unit of work rolled back");
        }
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        // sqlx queues the rollback when the transaction is dropped
        if self.tx.take().is_some() {
            warn!(unit = self.label, "Unit of work dropped without commit, rolling back");
        }
    }
}

//! Storage backend seam.
//!
//! The engines speak to the database through the object-safe [`Backend`]
//! and [`BackendTx`] traits; [`with_txn`] is the unit-of-work wrapper that
//! makes the transaction boundary visible at the call site — the closure
//! receives the transaction handle, `Ok` commits, `Err` rolls back.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

use crate::error::EngineError;
use crate::sql::{Dialect, SqlValue};

/// A database row decoded into an ordered JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Non-transactional read access plus transaction creation.
#[async_trait]
pub trait Backend: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn fetch_rows(&self, sql: &str, params: &[SqlValue])
        -> Result<Vec<Record>, EngineError>;

    async fn fetch_count(&self, sql: &str, params: &[SqlValue]) -> Result<u64, EngineError>;

    async fn begin(&self) -> Result<Box<dyn BackendTx>, EngineError>;
}

/// Statements executed inside one open transaction.
#[async_trait]
pub trait BackendTx: Send {
    async fn fetch_rows(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Record>, EngineError>;

    /// Execute a mutation, returning the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, EngineError>;

    async fn commit(self: Box<Self>) -> Result<(), EngineError>;

    async fn rollback(self: Box<Self>) -> Result<(), EngineError>;
}

/// Future returned by a unit-of-work closure.
pub type UnitOfWork<'t, T> = Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 't>>;

/// Run `work` inside a single transaction.
///
/// The transaction is committed when the closure returns `Ok` and rolled
/// back when it returns `Err`; the original error is propagated either way.
pub async fn with_txn<T, F>(backend: &dyn Backend, work: F) -> Result<T, EngineError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut (dyn BackendTx + 'static)) -> UnitOfWork<'t, T> + Send,
{
    let mut tx = backend.begin().await?;
    match work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            // Rollback failures are secondary; the closure's error wins.
            let _ = tx.rollback().await;
            Err(err)
        }
    }
}

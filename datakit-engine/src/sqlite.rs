//! SQLite implementation of the backend seam, over `sqlx`.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

use crate::backend::{Backend, BackendTx, Record};
use crate::error::EngineError;
use crate::sql::{Dialect, SqlValue};

/// Backend over an `sqlx::SqlitePool`.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind_params<'q>(
    sql: &'q str,
    params: &'q [SqlValue],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Null => query.bind(Option::<String>::None),
        };
    }
    query
}

fn row_to_record(row: &SqliteRow) -> Result<Record, EngineError> {
    let mut record = Record::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx).map_err(EngineError::database)?;
        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => {
                    serde_json::Value::from(row.try_get::<i64, _>(idx).map_err(EngineError::database)?)
                }
                "REAL" => {
                    let f = row.try_get::<f64, _>(idx).map_err(EngineError::database)?;
                    serde_json::Number::from_f64(f)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
                "BOOLEAN" => {
                    serde_json::Value::from(row.try_get::<bool, _>(idx).map_err(EngineError::database)?)
                }
                // Binary columns have no JSON representation in a record.
                "BLOB" => serde_json::Value::Null,
                _ => serde_json::Value::from(
                    row.try_get::<String, _>(idx).map_err(EngineError::database)?,
                ),
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

#[async_trait]
impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_rows(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Record>, EngineError> {
        let rows = bind_params(sql, params)
            .fetch_all(&self.pool)
            .await
            .map_err(EngineError::database)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn fetch_count(&self, sql: &str, params: &[SqlValue]) -> Result<u64, EngineError> {
        let row = bind_params(sql, params)
            .fetch_one(&self.pool)
            .await
            .map_err(EngineError::database)?;
        let count: i64 = row.try_get(0).map_err(EngineError::database)?;
        Ok(count.max(0) as u64)
    }

    async fn begin(&self) -> Result<Box<dyn BackendTx>, EngineError> {
        let tx = self.pool.begin().await.map_err(EngineError::database)?;
        Ok(Box::new(SqliteTx { tx }))
    }
}

struct SqliteTx {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl BackendTx for SqliteTx {
    async fn fetch_rows(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Record>, EngineError> {
        let rows = bind_params(sql, params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(EngineError::database)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, EngineError> {
        let result = bind_params(sql, params)
            .execute(&mut *self.tx)
            .await
            .map_err(EngineError::database)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), EngineError> {
        self.tx.commit().await.map_err(EngineError::database)
    }

    async fn rollback(self: Box<Self>) -> Result<(), EngineError> {
        self.tx.rollback().await.map_err(EngineError::database)
    }
}

//! Cascading deletion: child collections declared under `details` are
//! removed (or soft-deleted) before the parent row, all inside one
//! transaction.

use std::sync::Arc;

use datakit_schema::{SchemaDocument, SchemaResolver};

use crate::backend::{with_txn, Backend, BackendTx};
use crate::error::EngineError;
use crate::listing::sql_err;
use crate::sql::{SqlBuilder, SqlValue};

pub struct CascadeCoordinator {
    backend: Arc<dyn Backend>,
    resolver: Arc<SchemaResolver>,
}

impl CascadeCoordinator {
    pub fn new(backend: Arc<dyn Backend>, resolver: Arc<SchemaResolver>) -> Self {
        Self { backend, resolver }
    }

    /// Delete a parent record and its declared child collections.
    ///
    /// Children are processed in declaration order; a child is soft-deleted
    /// only when the parent deletion is soft *and* the child schema itself
    /// supports soft deletion, otherwise it is hard-deleted. The parent row
    /// goes last. Any failure rolls the whole transaction back, leaving
    /// children and parent untouched.
    pub async fn delete(
        &self,
        schema: &SchemaDocument,
        parent_id: impl Into<SqlValue>,
        soft: bool,
    ) -> Result<(), EngineError> {
        let dialect = self.backend.dialect();
        let parent_id = parent_id.into();
        let deleted_at = chrono::Utc::now().to_rfc3339();

        // Child schemas resolve and statements build before the transaction
        // opens; the transaction itself only executes.
        let mut statements: Vec<(String, Vec<SqlValue>)> = Vec::new();
        for detail in &schema.details {
            let child = self.resolver.resolve(&detail.model, None)?;
            let builder = SqlBuilder::new(&child.table, dialect)
                .where_eq(&detail.foreign_key, parent_id.clone());
            let statement = if soft && child.soft_delete {
                builder
                    .where_null("deleted_at")
                    .build_update(&[("deleted_at", SqlValue::Text(deleted_at.clone()))])
                    .map_err(sql_err)?
            } else {
                builder.build_delete().map_err(sql_err)?
            };
            statements.push(statement);
        }

        let parent_builder =
            SqlBuilder::new(&schema.table, dialect).where_eq(&schema.primary_key, parent_id);
        let parent_statement = if soft && schema.soft_delete {
            parent_builder
                .where_null("deleted_at")
                .build_update(&[("deleted_at", SqlValue::Text(deleted_at))])
                .map_err(sql_err)?
        } else {
            parent_builder.build_delete().map_err(sql_err)?
        };
        statements.push(parent_statement);

        tracing::debug!(
            entity = %schema.model,
            children = schema.details.len(),
            soft,
            "cascading delete"
        );

        with_txn(self.backend.as_ref(), move |tx: &mut (dyn BackendTx + 'static)| {
            Box::pin(async move {
                for (sql, params) in &statements {
                    tx.execute(sql, params).await?;
                }
                Ok(())
            })
        })
        .await
    }
}

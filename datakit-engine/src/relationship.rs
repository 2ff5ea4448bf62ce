//! Relationship traversal: many-to-many attach/detach through a pivot
//! table, and a read path that joins through either relationship kind and
//! applies the listing criteria semantics against the related schema.

use std::sync::Arc;

use datakit_schema::{Relationship, SchemaDocument, SchemaResolver};

use crate::backend::{with_txn, Backend, BackendTx};
use crate::criteria::{Criteria, ListResult};
use crate::error::EngineError;
use crate::listing::{
    apply_filters, apply_search, apply_soft_delete_scope, apply_sort, sql_err,
};
use crate::sql::{build_insert, SqlBuilder, SqlValue};

pub struct RelationshipEngine {
    backend: Arc<dyn Backend>,
    resolver: Arc<SchemaResolver>,
}

/// Canonical text form used to compare identifiers across value types, so
/// an integer fetched from the pivot matches the same id sent as text.
fn id_text(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(s) => s.clone(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Bool(b) => b.to_string(),
        SqlValue::Null => String::new(),
    }
}

fn dedupe(ids: &[SqlValue]) -> Vec<SqlValue> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for id in ids {
        let key = id_text(id);
        if !seen.contains(&key) {
            seen.push(key);
            out.push(id.clone());
        }
    }
    out
}

impl RelationshipEngine {
    pub fn new(backend: Arc<dyn Backend>, resolver: Arc<SchemaResolver>) -> Self {
        Self { backend, resolver }
    }

    fn pivot<'s>(
        schema: &'s SchemaDocument,
        name: &str,
        operation: &'static str,
    ) -> Result<(&'s str, &'s str, &'s str), EngineError> {
        let relationship = schema
            .relationship(name)
            .ok_or_else(|| EngineError::RelationshipNotFound(name.to_string()))?;
        match &relationship.kind {
            Relationship::ManyToMany {
                pivot_table,
                foreign_key,
                related_key,
            } => Ok((pivot_table, foreign_key, related_key)),
            Relationship::Through { .. } => Err(EngineError::UnsupportedRelationship {
                name: name.to_string(),
                operation,
            }),
        }
    }

    /// Link related identifiers to a parent through the pivot table.
    ///
    /// Idempotent: identifiers already linked are skipped, and the returned
    /// count covers newly inserted links only.
    pub async fn attach(
        &self,
        schema: &SchemaDocument,
        parent_id: impl Into<SqlValue>,
        name: &str,
        ids: &[SqlValue],
    ) -> Result<u64, EngineError> {
        let (pivot_table, foreign_key, related_key) = Self::pivot(schema, name, "attach")?;
        let ids = dedupe(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        let dialect = self.backend.dialect();
        let parent_id = parent_id.into();

        let (select_sql, select_params) = SqlBuilder::new(pivot_table, dialect)
            .where_eq(foreign_key, parent_id.clone())
            .where_in(related_key, ids.clone())
            .build_select(&[related_key])
            .map_err(sql_err)?;

        let pivot_table = pivot_table.to_string();
        let foreign_key = foreign_key.to_string();
        let related_key = related_key.to_string();

        with_txn(self.backend.as_ref(), move |tx: &mut (dyn BackendTx + 'static)| {
            Box::pin(async move {
                let existing_rows = tx.fetch_rows(&select_sql, &select_params).await?;
                let existing: Vec<String> = existing_rows
                    .iter()
                    .filter_map(|row| row.get(&related_key))
                    .map(|value| id_text(&SqlValue::from_json(value)))
                    .collect();

                let to_add: Vec<SqlValue> = ids
                    .into_iter()
                    .filter(|id| !existing.contains(&id_text(id)))
                    .collect();
                if to_add.is_empty() {
                    return Ok(0);
                }

                let rows: Vec<Vec<SqlValue>> = to_add
                    .iter()
                    .map(|id| vec![parent_id.clone(), id.clone()])
                    .collect();
                let (insert_sql, insert_params) = build_insert(
                    dialect,
                    &pivot_table,
                    &[&foreign_key, &related_key],
                    &rows,
                )
                .map_err(sql_err)?;
                tx.execute(&insert_sql, &insert_params).await?;
                Ok(to_add.len() as u64)
            })
        })
        .await
    }

    /// Unlink the given related identifiers from a parent. Only pivot rows
    /// for this parent and these identifiers are touched.
    pub async fn detach(
        &self,
        schema: &SchemaDocument,
        parent_id: impl Into<SqlValue>,
        name: &str,
        ids: &[SqlValue],
    ) -> Result<u64, EngineError> {
        let (pivot_table, foreign_key, related_key) = Self::pivot(schema, name, "detach")?;
        let ids = dedupe(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        let (delete_sql, delete_params) = SqlBuilder::new(pivot_table, self.backend.dialect())
            .where_eq(foreign_key, parent_id.into())
            .where_in(related_key, ids)
            .build_delete()
            .map_err(sql_err)?;

        with_txn(self.backend.as_ref(), move |tx: &mut (dyn BackendTx + 'static)| {
            Box::pin(async move { tx.execute(&delete_sql, &delete_params).await })
        })
        .await
    }

    /// List records reachable through a relationship, with the same
    /// criteria semantics as a plain listing. Criteria fields validate
    /// against the *related* entity's schema.
    pub async fn list_related(
        &self,
        schema: &SchemaDocument,
        parent_id: impl Into<SqlValue>,
        name: &str,
        criteria: &Criteria,
    ) -> Result<ListResult, EngineError> {
        let relationship = schema
            .relationship(name)
            .ok_or_else(|| EngineError::RelationshipNotFound(name.to_string()))?;
        // The relationship name doubles as the related entity's schema name.
        let related = self.resolver.resolve(&relationship.name, None)?;
        let dialect = self.backend.dialect();
        let parent_id = parent_id.into();

        let base = match &relationship.kind {
            Relationship::ManyToMany {
                pivot_table,
                foreign_key,
                related_key,
            } => SqlBuilder::new(&related.table, dialect)
                .inner_join(
                    pivot_table,
                    &format!("{pivot_table}.{related_key}"),
                    &format!("{}.{}", related.table, related.primary_key),
                )
                .where_eq(&format!("{pivot_table}.{foreign_key}"), parent_id),
            Relationship::Through {
                through,
                foreign_key,
                through_key,
            } => {
                let intermediate = self.resolver.resolve(through, None)?;
                SqlBuilder::new(&related.table, dialect)
                    .inner_join(
                        &intermediate.table,
                        &format!("{}.{}", intermediate.table, intermediate.primary_key),
                        &format!("{}.{}", related.table, through_key),
                    )
                    .where_eq(
                        &format!("{}.{}", intermediate.table, foreign_key),
                        parent_id,
                    )
            }
        };

        let qualifier = Some(related.table.as_str());
        let base = apply_soft_delete_scope(base, &related, criteria, qualifier);

        let (count_sql, count_params) = base.build_count().map_err(sql_err)?;
        let count = self.backend.fetch_count(&count_sql, &count_params).await?;

        let filtered = apply_search(
            apply_filters(base, &related, criteria, qualifier),
            &related,
            criteria,
            qualifier,
        );
        let (filtered_sql, filtered_params) = filtered.build_count().map_err(sql_err)?;
        let count_filtered = self
            .backend
            .fetch_count(&filtered_sql, &filtered_params)
            .await?;

        let paged = apply_sort(filtered, &related, criteria, qualifier)
            .limit(criteria.page_size())
            .offset(criteria.offset());
        let columns: Vec<String> = related
            .listable_columns()
            .iter()
            .map(|column| format!("{}.{column}", related.table))
            .collect();
        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        let (select_sql, select_params) = paged.build_select(&column_refs).map_err(sql_err)?;
        let rows = self.backend.fetch_rows(&select_sql, &select_params).await?;

        Ok(ListResult::new(rows, criteria, count, count_filtered))
    }
}

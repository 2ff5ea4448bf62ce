//! Generic record listing over a schema's backing table.
//!
//! The criteria-application helpers here are shared with the relationship
//! read path, so the field-whitelisting logic exists exactly once.

use std::sync::Arc;

use datakit_schema::{FieldDescriptor, FilterOp, SchemaDocument, SortDirection};

use crate::backend::Backend;
use crate::criteria::{Criteria, ListResult};
use crate::error::EngineError;
use crate::sql::{SqlBuilder, SqlError, SqlValue};

pub struct ListingEngine {
    backend: Arc<dyn Backend>,
}

impl ListingEngine {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// List records for one schema.
    ///
    /// `count` is computed with zero criteria applied (soft-delete scoping
    /// excepted), `count_filtered` after filters and search but before
    /// pagination. Criteria fields the schema does not whitelist are
    /// dropped, never forwarded.
    pub async fn list(
        &self,
        schema: &SchemaDocument,
        criteria: &Criteria,
    ) -> Result<ListResult, EngineError> {
        let base = SqlBuilder::new(&schema.table, self.backend.dialect());
        let base = apply_soft_delete_scope(base, schema, criteria, None);

        let (count_sql, count_params) = base.build_count().map_err(sql_err)?;
        let count = self.backend.fetch_count(&count_sql, &count_params).await?;

        let filtered = apply_search(
            apply_filters(base, schema, criteria, None),
            schema,
            criteria,
            None,
        );
        let (filtered_sql, filtered_params) = filtered.build_count().map_err(sql_err)?;
        let count_filtered = self
            .backend
            .fetch_count(&filtered_sql, &filtered_params)
            .await?;

        let paged = apply_sort(filtered, schema, criteria, None)
            .limit(criteria.page_size())
            .offset(criteria.offset());
        let columns = schema.listable_columns();
        let (select_sql, select_params) = paged.build_select(&columns).map_err(sql_err)?;
        let rows = self.backend.fetch_rows(&select_sql, &select_params).await?;

        Ok(ListResult::new(rows, criteria, count, count_filtered))
    }
}

/// Authoring defects surfaced by the SQL builder; engine callers only pass
/// schema-vetted names, so these never depend on request input.
pub(crate) fn sql_err(err: SqlError) -> EngineError {
    EngineError::InvalidConfig(err.to_string())
}

fn qualify(column: &str, qualifier: Option<&str>) -> String {
    match qualifier {
        Some(table) => format!("{table}.{column}"),
        None => column.to_string(),
    }
}

pub(crate) fn apply_soft_delete_scope(
    builder: SqlBuilder,
    schema: &SchemaDocument,
    criteria: &Criteria,
    qualifier: Option<&str>,
) -> SqlBuilder {
    if schema.soft_delete && !criteria.includes_deleted() {
        builder.where_null(&qualify("deleted_at", qualifier))
    } else {
        builder
    }
}

/// Escape LIKE metacharacters so user-supplied values match literally
/// inside the patterns the engines build.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Bind a filter value with the type the schema declares for the field,
/// falling back to text when it does not parse.
fn typed_value(field: &FieldDescriptor, value: &str) -> SqlValue {
    match field.field_type.as_str() {
        "int" | "integer" => value
            .parse::<i64>()
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(value.to_string())),
        "float" | "decimal" | "number" => value
            .parse::<f64>()
            .map(SqlValue::Real)
            .unwrap_or_else(|_| SqlValue::Text(value.to_string())),
        "bool" | "boolean" => match value {
            "true" | "1" => SqlValue::Bool(true),
            "false" | "0" => SqlValue::Bool(false),
            other => SqlValue::Text(other.to_string()),
        },
        _ => SqlValue::Text(value.to_string()),
    }
}

pub(crate) fn apply_filters(
    mut builder: SqlBuilder,
    schema: &SchemaDocument,
    criteria: &Criteria,
    qualifier: Option<&str>,
) -> SqlBuilder {
    for (field, value) in criteria.filter_entries() {
        let Some(descriptor) = schema.field(field).filter(|f| f.filterable) else {
            tracing::warn!(field, "dropping filter on non-filterable field");
            continue;
        };
        let column = qualify(field, qualifier);
        builder = match descriptor.filter_op() {
            FilterOp::Equals => builder.where_eq(&column, typed_value(descriptor, value)),
            FilterOp::Like => builder.where_ilike(&column, &format!("%{}%", escape_like(value))),
            FilterOp::StartsWith => {
                builder.where_ilike(&column, &format!("{}%", escape_like(value)))
            }
            FilterOp::EndsWith => builder.where_ilike(&column, &format!("%{}", escape_like(value))),
            FilterOp::GreaterThan => builder.where_gt(&column, typed_value(descriptor, value)),
            FilterOp::LessThan => builder.where_lt(&column, typed_value(descriptor, value)),
            FilterOp::Between => match value.split_once(',') {
                Some((low, high)) => builder.where_between(
                    &column,
                    typed_value(descriptor, low.trim()),
                    typed_value(descriptor, high.trim()),
                ),
                None => {
                    tracing::warn!(field, "dropping between filter without two values");
                    builder
                }
            },
        };
    }
    builder
}

pub(crate) fn apply_search(
    builder: SqlBuilder,
    schema: &SchemaDocument,
    criteria: &Criteria,
    qualifier: Option<&str>,
) -> SqlBuilder {
    let Some(term) = criteria.search_term() else {
        return builder;
    };
    let term = term.trim();
    if term.is_empty() {
        return builder;
    }
    let columns: Vec<String> = schema
        .searchable_fields()
        .iter()
        .map(|field| qualify(field, qualifier))
        .collect();
    if columns.is_empty() {
        tracing::warn!(
            entity = %schema.model,
            "dropping search term, schema declares no searchable fields"
        );
        return builder;
    }
    let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
    builder.search_any(&column_refs, &format!("%{}%", escape_like(term)))
}

pub(crate) fn apply_sort(
    builder: SqlBuilder,
    schema: &SchemaDocument,
    criteria: &Criteria,
    qualifier: Option<&str>,
) -> SqlBuilder {
    let (field, direction) = match criteria.sort_field() {
        Some((field, direction)) if schema.is_sortable(field) => (field.to_string(), direction),
        Some((field, _)) => {
            tracing::warn!(field, "dropping sort on non-sortable field");
            default_sort(schema)
        }
        None => default_sort(schema),
    };
    builder.order_by(&qualify(&field, qualifier), direction.is_ascending())
}

fn default_sort(schema: &SchemaDocument) -> (String, SortDirection) {
    schema
        .default_sort
        .clone()
        .unwrap_or_else(|| (schema.primary_key.clone(), SortDirection::Asc))
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SchemaError;

/// Sort direction for listing queries and `default_sort` declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_ascending(self) -> bool {
        matches!(self, SortDirection::Asc)
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Asc
    }
}

/// Filter operator declared per field via `filter_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    Like,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Between,
}

/// One field declaration inside a schema document.
///
/// Capability flags default to `false`; a field takes part in sorting,
/// filtering, or searching only when the document says so. This is the
/// whitelist the engines check before any name reaches a query.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub listable: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub filter_type: Option<FilterOp>,
}

impl FieldDescriptor {
    /// The operator used when a filter targets this field.
    pub fn filter_op(&self) -> FilterOp {
        self.filter_type.unwrap_or(FilterOp::Equals)
    }
}

/// A declared child collection, cascaded on parent deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailDecl {
    pub model: String,
    pub foreign_key: String,
    #[serde(default)]
    pub list_fields: Vec<String>,
}

/// A relationship resolved at load time into a closed set of kinds.
///
/// Each variant carries only the keys its traversal needs; a declaration
/// missing one of them never makes it past document validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relationship {
    /// Parent and related rows linked through a pivot table.
    ManyToMany {
        pivot_table: String,
        foreign_key: String,
        related_key: String,
    },
    /// Parent linked to related rows via an intermediate entity.
    Through {
        through: String,
        foreign_key: String,
        through_key: String,
    },
}

/// A resolved relationship together with its logical name.
///
/// The name doubles as the related entity's schema name.
#[derive(Debug, Clone)]
pub struct NamedRelationship {
    pub name: String,
    pub kind: Relationship,
}

#[derive(Debug, Clone, Copy, Deserialize)]
enum RelationshipKindTag {
    #[serde(rename = "many_to_many")]
    ManyToMany,
    #[serde(rename = "belongs_to_many_through")]
    Through,
}

#[derive(Debug, Deserialize)]
struct RelationshipDecl {
    name: String,
    #[serde(rename = "type")]
    kind: RelationshipKindTag,
    #[serde(default)]
    pivot_table: Option<String>,
    foreign_key: String,
    #[serde(default)]
    related_key: Option<String>,
    #[serde(default)]
    through: Option<String>,
    #[serde(default)]
    through_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSchemaDocument {
    model: String,
    table: String,
    primary_key: String,
    fields: IndexMap<String, FieldDescriptor>,
    #[serde(default)]
    default_sort: IndexMap<String, SortDirection>,
    #[serde(default)]
    permissions: BTreeMap<String, String>,
    #[serde(default)]
    soft_delete: bool,
    #[serde(default)]
    details: Vec<DetailDecl>,
    #[serde(default)]
    relationships: Vec<RelationshipDecl>,
}

/// An immutable, validated schema document for one entity.
///
/// Documents are parsed once, relationship declarations are resolved into
/// [`Relationship`] variants during deserialization, and the result is
/// shared read-only (the resolver hands out `Arc`s).
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawSchemaDocument")]
pub struct SchemaDocument {
    pub model: String,
    pub table: String,
    pub primary_key: String,
    pub fields: IndexMap<String, FieldDescriptor>,
    pub default_sort: Option<(String, SortDirection)>,
    pub permissions: BTreeMap<String, String>,
    pub soft_delete: bool,
    pub details: Vec<DetailDecl>,
    pub relationships: Vec<NamedRelationship>,
}

impl TryFrom<RawSchemaDocument> for SchemaDocument {
    type Error = SchemaError;

    fn try_from(raw: RawSchemaDocument) -> Result<Self, Self::Error> {
        if raw.model.is_empty() {
            return Err(SchemaError::invalid("<unnamed>", "missing model name"));
        }
        if raw.table.is_empty() {
            return Err(SchemaError::invalid(&raw.model, "missing table name"));
        }
        if raw.primary_key.is_empty() {
            return Err(SchemaError::invalid(&raw.model, "missing primary key"));
        }

        let default_sort = match raw.default_sort.into_iter().next() {
            Some((field, direction)) => {
                if !raw.fields.contains_key(&field) {
                    return Err(SchemaError::invalid(
                        &raw.model,
                        format!("default_sort references unknown field '{field}'"),
                    ));
                }
                Some((field, direction))
            }
            None => None,
        };

        for detail in &raw.details {
            if detail.model.is_empty() || detail.foreign_key.is_empty() {
                return Err(SchemaError::invalid(
                    &raw.model,
                    "detail declaration requires model and foreign_key",
                ));
            }
        }

        let mut relationships = Vec::with_capacity(raw.relationships.len());
        for decl in raw.relationships {
            if relationships
                .iter()
                .any(|r: &NamedRelationship| r.name == decl.name)
            {
                return Err(SchemaError::invalid(
                    &raw.model,
                    format!("duplicate relationship '{}'", decl.name),
                ));
            }
            let kind = resolve_relationship(&raw.model, decl)?;
            relationships.push(kind);
        }

        Ok(SchemaDocument {
            model: raw.model,
            table: raw.table,
            primary_key: raw.primary_key,
            fields: raw.fields,
            default_sort,
            permissions: raw.permissions,
            soft_delete: raw.soft_delete,
            details: raw.details,
            relationships,
        })
    }
}

fn resolve_relationship(
    model: &str,
    decl: RelationshipDecl,
) -> Result<NamedRelationship, SchemaError> {
    let kind = match decl.kind {
        RelationshipKindTag::ManyToMany => {
            let pivot_table = decl.pivot_table.filter(|s| !s.is_empty()).ok_or_else(|| {
                SchemaError::invalid(
                    model,
                    format!("relationship '{}' is missing pivot_table", decl.name),
                )
            })?;
            let related_key = decl.related_key.filter(|s| !s.is_empty()).ok_or_else(|| {
                SchemaError::invalid(
                    model,
                    format!("relationship '{}' is missing related_key", decl.name),
                )
            })?;
            Relationship::ManyToMany {
                pivot_table,
                foreign_key: decl.foreign_key,
                related_key,
            }
        }
        RelationshipKindTag::Through => {
            let through = decl.through.filter(|s| !s.is_empty()).ok_or_else(|| {
                SchemaError::invalid(
                    model,
                    format!("relationship '{}' is missing through", decl.name),
                )
            })?;
            let through_key = decl.through_key.filter(|s| !s.is_empty()).ok_or_else(|| {
                SchemaError::invalid(
                    model,
                    format!("relationship '{}' is missing through_key", decl.name),
                )
            })?;
            Relationship::Through {
                through,
                foreign_key: decl.foreign_key,
                through_key,
            }
        }
    };
    Ok(NamedRelationship {
        name: decl.name,
        kind,
    })
}

impl SchemaDocument {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn is_sortable(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.sortable)
    }

    pub fn is_filterable(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.filterable)
    }

    /// Field names flagged `searchable`, in declaration order.
    pub fn searchable_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.searchable)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Columns selected by listing queries: the primary key plus every
    /// `listable` field. A document that flags nothing listable selects
    /// all declared fields.
    pub fn listable_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = vec![self.primary_key.as_str()];
        let any_listable = self.fields.values().any(|f| f.listable);
        for (name, field) in &self.fields {
            if name == &self.primary_key {
                continue;
            }
            if !any_listable || field.listable {
                columns.push(name.as_str());
            }
        }
        columns
    }

    pub fn relationship(&self, name: &str) -> Option<&NamedRelationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Access-check identifier for a logical action, if declared.
    pub fn permission(&self, action: &str) -> Option<&str> {
        self.permissions.get(action).map(String::as_str)
    }

    /// Derive a read-only projection scoped to one usage context.
    ///
    /// `list` keeps listable fields, `form` keeps editable fields, and
    /// `detail` keeps listable fields plus the detail declarations. Any
    /// other context returns the document unfiltered.
    pub fn project(&self, context: &str) -> ContextProjection {
        let (fields, details) = match context {
            "list" => (self.fields_where(|f| f.listable), Vec::new()),
            "form" => (self.fields_where(|f| f.editable), Vec::new()),
            "detail" => (self.fields_where(|f| f.listable), self.details.clone()),
            _ => (self.fields.clone(), self.details.clone()),
        };
        ContextProjection {
            entity: self.model.clone(),
            context: context.to_string(),
            fields,
            details,
        }
    }

    fn fields_where(
        &self,
        keep: impl Fn(&FieldDescriptor) -> bool,
    ) -> IndexMap<String, FieldDescriptor> {
        self.fields
            .iter()
            .filter(|(_, f)| keep(f))
            .map(|(name, f)| (name.clone(), f.clone()))
            .collect()
    }
}

/// A schema document filtered to one usage context.
#[derive(Debug, Clone)]
pub struct ContextProjection {
    pub entity: String,
    pub context: String,
    pub fields: IndexMap<String, FieldDescriptor>,
    pub details: Vec<DetailDecl>,
}

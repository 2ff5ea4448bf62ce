use dashmap::DashMap;
use std::sync::Arc;

use crate::document::{ContextProjection, SchemaDocument};
use crate::error::SchemaError;
use crate::source::SchemaSource;

/// Caching front-end over a [`SchemaSource`].
///
/// Documents are loaded lazily, validated once, and shared as `Arc`s; a
/// cache hit returns the same in-memory value without re-parsing. The two
/// caches (full documents keyed by `entity:connection`, projections keyed
/// by `entity:context`) are safe for concurrent readers, and an explicit
/// [`clear_cache`](SchemaResolver::clear_cache) never leaves a torn entry:
/// a racing resolve sees either the pre-clear value or a fresh load.
pub struct SchemaResolver {
    source: Arc<dyn SchemaSource>,
    documents: DashMap<String, Arc<SchemaDocument>>,
    projections: DashMap<String, Arc<ContextProjection>>,
}

fn document_key(entity: &str, connection: Option<&str>) -> String {
    format!("{entity}:{}", connection.unwrap_or(""))
}

fn projection_key(entity: &str, context: &str) -> String {
    format!("{entity}:{context}")
}

impl SchemaResolver {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            documents: DashMap::new(),
            projections: DashMap::new(),
        }
    }

    /// Resolve the full document for an entity, loading and caching it on
    /// first use.
    pub fn resolve(
        &self,
        entity: &str,
        connection: Option<&str>,
    ) -> Result<Arc<SchemaDocument>, SchemaError> {
        let key = document_key(entity, connection);
        if let Some(doc) = self.documents.get(&key) {
            return Ok(Arc::clone(doc.value()));
        }
        tracing::debug!(entity, ?connection, "schema cache miss, loading document");
        let doc = Arc::new(self.source.load(entity, connection)?);
        // A concurrent resolve may have inserted meanwhile; keep whichever
        // entry won so all callers share one value.
        let entry = self.documents.entry(key).or_insert(doc);
        Ok(Arc::clone(entry.value()))
    }

    /// Resolve a context-scoped projection of an entity's document.
    ///
    /// An unknown context yields the full field set (permissive default).
    pub fn project(
        &self,
        entity: &str,
        context: &str,
    ) -> Result<Arc<ContextProjection>, SchemaError> {
        let key = projection_key(entity, context);
        if let Some(projection) = self.projections.get(&key) {
            return Ok(Arc::clone(projection.value()));
        }
        let doc = self.resolve(entity, None)?;
        let projection = Arc::new(doc.project(context));
        let entry = self.projections.entry(key).or_insert(projection);
        Ok(Arc::clone(entry.value()))
    }

    /// Evict cached entries.
    ///
    /// With no entity, everything is evicted. With an entity and no
    /// connection, all of that entity's documents and projections go. With
    /// both, only the one document entry goes (projections for the entity
    /// are evicted as well, since they derive from the default connection).
    pub fn clear_cache(&self, entity: Option<&str>, connection: Option<&str>) {
        match (entity, connection) {
            (None, _) => {
                self.documents.clear();
                self.projections.clear();
            }
            (Some(entity), None) => {
                let prefix = format!("{entity}:");
                self.documents.retain(|key, _| !key.starts_with(&prefix));
                self.projections.retain(|key, _| !key.starts_with(&prefix));
            }
            (Some(entity), Some(connection)) => {
                self.documents
                    .remove(&document_key(entity, Some(connection)));
                let prefix = format!("{entity}:");
                self.projections.retain(|key, _| !key.starts_with(&prefix));
            }
        }
    }
}

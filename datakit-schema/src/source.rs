use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::document::SchemaDocument;
use crate::error::SchemaError;

/// Backing store for schema documents.
///
/// Implementations hold the raw, versioned configuration; the
/// [`SchemaResolver`](crate::resolver::SchemaResolver) layers caching and
/// projections on top. `connection` selects an alternate document set when
/// one entity is described differently per database connection.
pub trait SchemaSource: Send + Sync {
    fn load(&self, entity: &str, connection: Option<&str>)
        -> Result<SchemaDocument, SchemaError>;
}

/// Loads `<root>/<entity>.json`, or `<root>/<connection>/<entity>.json`
/// when a connection is given.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, entity: &str, connection: Option<&str>) -> PathBuf {
        let mut path = self.root.clone();
        if let Some(connection) = connection {
            path.push(connection);
        }
        path.push(format!("{entity}.json"));
        path
    }
}

impl SchemaSource for DirectorySource {
    fn load(
        &self,
        entity: &str,
        connection: Option<&str>,
    ) -> Result<SchemaDocument, SchemaError> {
        let path = self.document_path(entity, connection);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SchemaError::NotFound(entity.to_string()));
            }
            Err(err) => {
                return Err(SchemaError::Load(format!(
                    "reading {}: {err}",
                    path.display()
                )));
            }
        };
        parse_document(entity, &raw)
    }
}

/// In-memory source for tests and embedded setups.
///
/// Keys are entity names, optionally prefixed with a connection as
/// `<connection>/<entity>`.
#[derive(Default)]
pub struct StaticSource {
    documents: HashMap<String, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, entity: &str, json: serde_json::Value) -> Self {
        self.documents.insert(entity.to_string(), json.to_string());
        self
    }

    pub fn insert(&mut self, entity: &str, json: serde_json::Value) {
        self.documents.insert(entity.to_string(), json.to_string());
    }
}

impl SchemaSource for StaticSource {
    fn load(
        &self,
        entity: &str,
        connection: Option<&str>,
    ) -> Result<SchemaDocument, SchemaError> {
        let key = match connection {
            Some(connection) => format!("{connection}/{entity}"),
            None => entity.to_string(),
        };
        let raw = self
            .documents
            .get(&key)
            .ok_or_else(|| SchemaError::NotFound(entity.to_string()))?;
        parse_document(entity, raw)
    }
}

fn parse_document(entity: &str, raw: &str) -> Result<SchemaDocument, SchemaError> {
    // Malformed JSON is a load failure; a document that parses but violates
    // a structural invariant is an authoring defect.
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| SchemaError::Load(format!("parsing schema '{entity}': {err}")))?;
    serde_json::from_value(value).map_err(|err| SchemaError::invalid(entity, err.to_string()))
}

/// Validate a directory of schema documents eagerly, returning the entity
/// names that parsed. Useful at startup to fail fast on authoring defects.
pub fn preload_directory(root: &Path) -> Result<Vec<String>, SchemaError> {
    let mut entities = Vec::new();
    let entries = std::fs::read_dir(root)
        .map_err(|err| SchemaError::Load(format!("reading {}: {err}", root.display())))?;
    for entry in entries {
        let entry =
            entry.map_err(|err| SchemaError::Load(format!("reading {}: {err}", root.display())))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let source = DirectorySource::new(root);
        source.load(stem, None)?;
        entities.push(stem.to_string());
    }
    entities.sort();
    Ok(entities)
}

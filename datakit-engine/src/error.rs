use datakit_schema::SchemaError;

/// Errors raised by the data-access engines.
///
/// Invalid criteria fields are deliberately *not* represented here: the
/// engines drop filter/sort/search fields that fail schema validation so a
/// listing stays robust against stale callers.
#[derive(Debug)]
pub enum EngineError {
    /// The entity name could not be resolved to a schema document.
    SchemaNotFound(String),
    /// The named relationship is absent from the schema.
    RelationshipNotFound(String),
    /// The relationship exists but does not support the operation.
    UnsupportedRelationship {
        name: String,
        operation: &'static str,
    },
    /// A schema-authoring defect detected before any query executed.
    InvalidConfig(String),
    /// An underlying database failure, propagated unmodified after any
    /// open transaction was rolled back.
    Database(Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Construct a `Database` variant from any driver error type.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        EngineError::Database(Box::new(err))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::SchemaNotFound(entity) => write!(f, "Schema not found: {entity}"),
            EngineError::RelationshipNotFound(name) => {
                write!(f, "Relationship not found: {name}")
            }
            EngineError::UnsupportedRelationship { name, operation } => {
                write!(f, "Relationship '{name}' does not support {operation}")
            }
            EngineError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            EngineError::Database(err) => write!(f, "Database error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::NotFound(entity) => EngineError::SchemaNotFound(entity),
            SchemaError::Invalid { entity, reason } => {
                EngineError::InvalidConfig(format!("schema '{entity}': {reason}"))
            }
            SchemaError::Load(msg) => EngineError::InvalidConfig(msg),
        }
    }
}

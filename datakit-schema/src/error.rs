/// Errors raised while loading or resolving schema documents.
#[derive(Debug, Clone)]
pub enum SchemaError {
    /// No document exists for the requested entity name.
    NotFound(String),
    /// The document exists but violates a structural invariant.
    Invalid { entity: String, reason: String },
    /// An I/O or parse failure while reading a document.
    Load(String),
}

impl SchemaError {
    pub fn invalid(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::Invalid {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::NotFound(entity) => write!(f, "Schema not found: {entity}"),
            SchemaError::Invalid { entity, reason } => {
                write!(f, "Invalid schema '{entity}': {reason}")
            }
            SchemaError::Load(msg) => write!(f, "Schema load error: {msg}"),
        }
    }
}

impl std::error::Error for SchemaError {}

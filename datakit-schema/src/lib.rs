//! # datakit-schema — schema documents and resolution
//!
//! Declarative JSON documents describe one entity each: its backing table,
//! fields with capability flags, child collections, and relationships. This
//! crate parses and validates those documents, serves them through a
//! caching [`SchemaResolver`], and derives context-scoped projections.
//!
//! The documents are the single contract shared with `datakit-engine`: the
//! engines consult a document's capability flags before any field name is
//! allowed anywhere near a query.

pub mod document;
pub mod error;
pub mod resolver;
pub mod source;

pub use document::{
    ContextProjection, DetailDecl, FieldDescriptor, FilterOp, NamedRelationship, Relationship,
    SchemaDocument, SortDirection,
};
pub use error::SchemaError;
pub use resolver::SchemaResolver;
pub use source::{DirectorySource, SchemaSource, StaticSource};

pub mod prelude {
    //! Re-exports of the most commonly used schema types.
    pub use crate::{
        FieldDescriptor, FilterOp, Relationship, SchemaDocument, SchemaError, SchemaResolver,
        SchemaSource, SortDirection,
    };
}

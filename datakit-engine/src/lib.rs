//! # datakit-engine — schema-driven data access over SQLx
//!
//! Three stateless engines execute generic data-access operations against
//! the metadata in [`datakit_schema`] documents:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ListingEngine`] | Sort/filter/search/paginate over an entity's backing table |
//! | [`RelationshipEngine`] | Many-to-many attach/detach plus joined reads (pivot and through) |
//! | [`CascadeCoordinator`] | Child-then-parent deletion in one transaction, soft-delete aware |
//!
//! All three share one injection-safety invariant: no field name reaches a
//! query unless the schema whitelists it for the relevant capability. The
//! database is reached through the object-safe [`Backend`] seam;
//! [`SqliteBackend`] is the bundled implementation (`sqlite` feature, on by
//! default; `postgres` enables the sqlx driver for custom backends).

pub mod backend;
pub mod cascade;
pub mod criteria;
pub mod error;
pub mod listing;
pub mod relationship;
pub mod sql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::{with_txn, Backend, BackendTx, Record, UnitOfWork};
pub use cascade::CascadeCoordinator;
pub use criteria::{Criteria, ListResult, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use error::EngineError;
pub use listing::ListingEngine;
pub use relationship::RelationshipEngine;
pub use sql::{Dialect, SqlBuilder, SqlError, SqlValue};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

pub mod prelude {
    //! Re-exports of the most commonly used engine types.
    pub use crate::{
        Backend, CascadeCoordinator, Criteria, EngineError, ListResult, ListingEngine,
        RelationshipEngine, SqlValue,
    };
    #[cfg(feature = "sqlite")]
    pub use crate::SqliteBackend;
    pub use datakit_schema::prelude::*;
}

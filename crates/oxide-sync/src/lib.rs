//! # oxide-sync
//!
//! Runs schema synchronization against live databases. The planning engine
//! lives in [`oxide_sync_core`]; this crate adds what needs a connection:
//!
//! - [`provider`]: the [`ExecutionProvider`](provider::ExecutionProvider)
//!   trait and a sqlx `AnyConnection` implementation for PostgreSQL, MySQL
//!   and SQLite
//! - [`introspect`]: catalog readers building the live model per dialect
//! - [`coordinator`]: applies a script transactionally or with compensation
//! - [`runner`]: [`SchemaSync`](runner::SchemaSync), one run end to end
//! - [`export`]: timestamped `.sql` files of executed statements
//! - [`document`]: entity descriptors as JSON
//!
//! ## Example
//!
//! ```rust,no_run
//! use oxide_sync::prelude::*;
//!
//! # async fn run() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let entities = vec![
//!     EntityDescriptor::new("Customer")
//!         .property(Property::new("Name", SemanticType::Text(Some(80)))),
//! ];
//!
//! let mut provider = SqlxProvider::connect("sqlite::memory:").await?;
//! let sync = SchemaSync::new(Dialect::Sqlite, SyncContext::new());
//! let report = sync.update(&mut provider, &entities).await?;
//! assert_eq!(report.statements_executed, 1);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod document;
pub mod export;
pub mod introspect;
pub mod provider;
pub mod runner;

pub use oxide_sync_core;

/// Re-export of commonly used types.
pub mod prelude {
    pub use crate::coordinator::ExecutionCoordinator;
    pub use crate::document::{DocumentError, load_entities, parse_entities};
    pub use crate::export::SqlExport;
    pub use crate::introspect::{SchemaIntrospector, introspector};
    pub use crate::provider::{ExecutionProvider, ProviderError, Row, SqlxProvider};
    pub use crate::runner::{RunReport, SchemaSync, SyncJob, SyncPlan, sync_databases};
    pub use oxide_sync_core::prelude::*;
}

//! Schema synchronization core.
//!
//! `oxide-sync-core` reconciles a live relational schema with a set of
//! declared entities. It knows nothing about connections: the live schema
//! comes in as a [`LiveModel`](model::LiveModel), and what goes out is an
//! ordered list of literal SQL statements for one of five dialects
//! (SQL Server, MySQL, PostgreSQL, SQLite, Oracle).
//!
//! # Pipeline
//!
//! - **Extract** - [`TargetSchemaExtractor`](extract::TargetSchemaExtractor)
//!   turns entity descriptors into target tables, validating every type
//!   against the dialect
//! - **Diff** - [`SchemaDiffer`](diff::SchemaDiffer) compares target and live
//!   tables and builds an [`OperationPlan`](plan::OperationPlan); every
//!   destructive change is authorized by the [`SafetyGuard`](guard::SafetyGuard)
//!   on the way
//! - **Render** - [`Script`](script::Script) renders the plan through a
//!   [`DialectAdapter`](dialect::DialectAdapter), together with the
//!   compensations a non-transactional dialect needs
//!
//! # Example
//!
//! ```rust
//! use oxide_sync_core::prelude::*;
//!
//! let entities = vec![
//!     EntityDescriptor::new("Customer")
//!         .property(Property::new("Name", SemanticType::Text(Some(80)))),
//!     EntityDescriptor::new("Order")
//!         .property(Property::new("CustomerId", SemanticType::Integer).references("Customer", "Id")),
//! ];
//!
//! let adapter = Dialect::Postgres.adapter();
//! let target = TargetSchemaExtractor::new(adapter.as_ref())
//!     .extract(&entities, Some("public"))
//!     .unwrap();
//! let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
//!     .plan(&target, &LiveModel::empty("public"))
//!     .unwrap();
//! let script = Script::render(&plan, adapter.as_ref()).unwrap();
//!
//! assert_eq!(script.len(), 3);
//! ```

pub mod context;
pub mod dialect;
pub mod diff;
pub mod entity;
pub mod error;
pub mod extract;
pub mod guard;
pub mod model;
pub mod operation;
pub mod plan;
pub mod script;
pub mod types;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::context::SyncContext;
    pub use crate::dialect::{Capabilities, Dialect, DialectAdapter};
    pub use crate::diff::{SchemaDiff, SchemaDiffer};
    pub use crate::entity::{EntityDescriptor, EntityKey, ForeignKeyMarker, IdKind, Property};
    pub use crate::error::{ErrorKind, FailureOutcome, Result, SyncError};
    pub use crate::extract::TargetSchemaExtractor;
    pub use crate::guard::{DestructiveKind, PolicyViolation, SafetyGuard, ViolationKind};
    pub use crate::model::{
        LiveColumnInfo, LiveModel, LiveTable, LiveUniqueConstraint, TableDescriptor, TargetModel,
    };
    pub use crate::operation::Operation;
    pub use crate::plan::{Batch, OperationPlan};
    pub use crate::script::{Script, ScriptStatement, Strategy};
    pub use crate::types::SemanticType;
}

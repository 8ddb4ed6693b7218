//! Safety guard for destructive schema changes.
//!
//! Every destructive operation the differ wants to emit must first obtain a
//! [`Grant`] here. Grants cannot be constructed anywhere else, so an
//! [`Operation`](crate::operation::Operation) that carries one is proof the
//! change was authorized when the diff was built.

use std::fmt;

use tracing::warn;

use crate::context::SyncContext;

/// Kinds of destructive change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestructiveKind {
    /// Dropping a column.
    ColumnDrop,
    /// Flipping a column from nullable to not-null.
    NullabilityTighten,
    /// Replacing the primary key.
    PrimaryKeyChange,
    /// Dropping a foreign key or unique constraint.
    ConstraintDrop,
    /// Dropping a whole table.
    TableDrop,
}

impl DestructiveKind {
    /// Human description of the action, used in policy messages.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::ColumnDrop => "drop column(s)",
            Self::NullabilityTighten => "make column(s) NOT NULL",
            Self::PrimaryKeyChange => "change the primary key",
            Self::ConstraintDrop => "drop constraint",
            Self::TableDrop => "drop table",
        }
    }

    /// Whether developer mode alone may authorize this kind.
    #[must_use]
    pub const fn developer_mode_suffices(self) -> bool {
        !matches!(self, Self::TableDrop)
    }
}

impl fmt::Display for DestructiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ColumnDrop => "column-drop",
            Self::NullabilityTighten => "nullability-tighten",
            Self::PrimaryKeyChange => "primary-key-change",
            Self::ConstraintDrop => "constraint-drop",
            Self::TableDrop => "table-drop",
        };
        f.write_str(name)
    }
}

/// What authorized a destructive change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationSource {
    /// Developer mode was enabled for the run.
    DeveloperMode,
    /// The operator passed `--force`.
    Force,
}

impl fmt::Display for AuthorizationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeveloperMode => f.write_str("developer-mode"),
            Self::Force => f.write_str("force"),
        }
    }
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Allowed, with the flag that allowed it.
    Allow(AuthorizationSource),
    /// Blocked.
    Deny,
}

/// Decides whether a destructive change may proceed.
///
/// `--force` authorizes every kind. Developer mode authorizes everything
/// except dropping whole tables.
#[must_use]
pub const fn authorize(kind: DestructiveKind, developer_mode: bool, force: bool) -> Decision {
    if force {
        Decision::Allow(AuthorizationSource::Force)
    } else if developer_mode && kind.developer_mode_suffices() {
        Decision::Allow(AuthorizationSource::DeveloperMode)
    } else {
        Decision::Deny
    }
}

/// Proof that a destructive change was authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    kind: DestructiveKind,
    source: AuthorizationSource,
}

impl Grant {
    /// The authorized kind.
    #[must_use]
    pub const fn kind(&self) -> DestructiveKind {
        self.kind
    }

    /// What authorized it.
    #[must_use]
    pub const fn source(&self) -> AuthorizationSource {
        self.source
    }
}

/// Why a run was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// A destructive change without authorization.
    Destructive(DestructiveKind),
    /// A new foreign key column declared NOT NULL on an existing table.
    RequiredForeignKeyColumn,
    /// A unique group containing a nullable column.
    NullableUniqueColumn {
        /// Unique group id.
        group: String,
    },
}

/// A blocked change, naming exactly what was blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    /// Table the change applies to.
    pub table: String,
    /// Columns involved.
    pub columns: Vec<String>,
    /// Constraint involved, if any.
    pub constraint: Option<String>,
    /// What was blocked.
    pub kind: ViolationKind,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.columns.join(", ");
        match &self.kind {
            ViolationKind::Destructive(kind) => {
                write!(f, "refusing to {} on table {}", kind.action(), self.table)?;
                if let Some(constraint) = &self.constraint {
                    write!(f, " ({constraint})")?;
                }
                if !columns.is_empty() {
                    write!(f, ": {columns}")?;
                }
                if kind.developer_mode_suffices() {
                    f.write_str("; enable developer mode or rerun with `update --force` to authorize")
                } else {
                    f.write_str("; rerun with `--force` to authorize")
                }
            }
            ViolationKind::RequiredForeignKeyColumn => write!(
                f,
                "cannot add NOT NULL foreign key column(s) {columns} to existing table {}: \
                 there is no safe value to backfill a required relationship; declare the \
                 column nullable",
                self.table
            ),
            ViolationKind::NullableUniqueColumn { group } => write!(
                f,
                "unique group {group} on table {} contains nullable column(s) {columns}; \
                 every column of a unique group must be NOT NULL",
                self.table
            ),
        }
    }
}

impl std::error::Error for PolicyViolation {}

/// Policy gate consulted by the differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SafetyGuard {
    developer_mode: bool,
    force: bool,
}

impl SafetyGuard {
    /// Creates a guard from the two operator flags.
    #[must_use]
    pub const fn new(developer_mode: bool, force: bool) -> Self {
        Self {
            developer_mode,
            force,
        }
    }

    /// Creates a guard from the run context.
    #[must_use]
    pub const fn from_context(context: &SyncContext) -> Self {
        Self::new(context.developer_mode, context.force)
    }

    /// Requests authorization for a destructive change.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyViolation`] naming the table, columns and constraint
    /// when neither flag authorizes `kind`.
    pub fn check(
        &self,
        kind: DestructiveKind,
        table: &str,
        columns: &[String],
        constraint: Option<&str>,
    ) -> Result<Grant, PolicyViolation> {
        match authorize(kind, self.developer_mode, self.force) {
            Decision::Allow(source) => {
                warn!(
                    table = %table,
                    columns = ?columns,
                    constraint = ?constraint,
                    kind = %kind,
                    source = %source,
                    "Authorized destructive change"
                );
                Ok(Grant { kind, source })
            }
            Decision::Deny => Err(PolicyViolation {
                table: table.to_string(),
                columns: columns.to_vec(),
                constraint: constraint.map(str::to_string),
                kind: ViolationKind::Destructive(kind),
            }),
        }
    }
}

//! Dialect-neutral schema operations.

use std::fmt;

use crate::guard::Grant;
use crate::model::{
    ColumnDescriptor, ForeignKeyGroup, LiveColumnInfo, LiveForeignKeyGroup, LiveUniqueConstraint,
    TableDescriptor,
};
use crate::types::SemanticType;

/// Where a rebuilt table's column gets its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    /// Copied as-is from the shadow column.
    Column(String),
    /// Copied from the shadow column, NULLs replaced with the type default.
    Coalesce(String, SemanticType),
    /// Filled with the type default.
    Default(SemanticType),
}

/// One column of a rebuild's `INSERT ... SELECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyColumn {
    /// Column in the rebuilt table.
    pub target: String,
    /// Value source.
    pub source: CopySource,
}

/// A single schema change.
///
/// Destructive variants carry the [`Grant`] that authorized them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a table.
    CreateTable {
        /// Full target table.
        table: TableDescriptor,
        /// Emit foreign keys and unique groups inside the CREATE.
        inline_constraints: bool,
    },
    /// Add a column.
    AddColumn {
        /// Table name.
        table: String,
        /// New column.
        column: ColumnDescriptor,
    },
    /// Replace NULLs with the type default ahead of a NOT NULL flip.
    Backfill {
        /// Table name.
        table: String,
        /// Column being tightened.
        column: ColumnDescriptor,
    },
    /// Make a column NOT NULL.
    SetNotNull {
        /// Table name.
        table: String,
        /// Target column.
        column: ColumnDescriptor,
        /// Live column, for dialects that restate the type.
        live: LiveColumnInfo,
        /// Authorization.
        grant: Grant,
    },
    /// Make a column nullable.
    DropNotNull {
        /// Table name.
        table: String,
        /// Target column.
        column: ColumnDescriptor,
        /// Live column.
        live: LiveColumnInfo,
    },
    /// Drop the primary key.
    DropPrimaryKey {
        /// Table name.
        table: String,
        /// Constraint name, where the dialect names it.
        constraint: Option<String>,
        /// Columns of the dropped key.
        columns: Vec<String>,
        /// Authorization.
        grant: Grant,
    },
    /// Add a primary key.
    AddPrimaryKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Key columns.
        columns: Vec<String>,
    },
    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Constraint.
        foreign_key: ForeignKeyGroup,
    },
    /// Add a unique constraint.
    AddUniqueGroup {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Columns.
        columns: Vec<String>,
    },
    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Live constraint, owning table included.
        foreign_key: LiveForeignKeyGroup,
        /// Authorization; absent when the key is re-added with a new delete
        /// rule.
        grant: Option<Grant>,
    },
    /// Drop a unique constraint.
    DropUnique {
        /// Table name.
        table: String,
        /// Live constraint.
        constraint: LiveUniqueConstraint,
        /// Authorization.
        grant: Grant,
    },
    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Live column.
        column: LiveColumnInfo,
        /// Authorization.
        grant: Grant,
    },
    /// Recreate a table through a shadow copy.
    RebuildTable {
        /// Full target table.
        table: TableDescriptor,
        /// Name the existing table is renamed to.
        shadow: String,
        /// Columns carried over.
        copy: Vec<CopyColumn>,
        /// Authorizations for the destructive changes folded into the rebuild.
        grants: Vec<Grant>,
    },
    /// Drop a table.
    DropTable {
        /// Table name.
        table: String,
        /// Authorization.
        grant: Grant,
    },
}

impl Operation {
    /// Table the operation applies to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. } | Self::RebuildTable { table, .. } => &table.name,
            Self::DropForeignKey { foreign_key, .. } => &foreign_key.table,
            Self::AddColumn { table, .. }
            | Self::Backfill { table, .. }
            | Self::SetNotNull { table, .. }
            | Self::DropNotNull { table, .. }
            | Self::DropPrimaryKey { table, .. }
            | Self::AddPrimaryKey { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::AddUniqueGroup { table, .. }
            | Self::DropUnique { table, .. }
            | Self::DropColumn { table, .. }
            | Self::DropTable { table, .. } => table,
        }
    }

    /// Grants carried by the operation.
    #[must_use]
    pub fn grants(&self) -> Vec<&Grant> {
        match self {
            Self::SetNotNull { grant, .. }
            | Self::DropPrimaryKey { grant, .. }
            | Self::DropForeignKey {
                grant: Some(grant), ..
            }
            | Self::DropUnique { grant, .. }
            | Self::DropColumn { grant, .. }
            | Self::DropTable { grant, .. } => vec![grant],
            Self::RebuildTable { grants, .. } => grants.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` when the operation can lose data or structure.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        !self.grants().is_empty()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table, .. } => write!(f, "create table {}", table.name),
            Self::AddColumn { table, column } => write!(f, "add column {table}.{}", column.name),
            Self::Backfill { table, column } => write!(f, "backfill {table}.{}", column.name),
            Self::SetNotNull { table, column, .. } => {
                write!(f, "set not null {table}.{}", column.name)
            }
            Self::DropNotNull { table, column, .. } => {
                write!(f, "drop not null {table}.{}", column.name)
            }
            Self::DropPrimaryKey { table, .. } => write!(f, "drop primary key on {table}"),
            Self::AddPrimaryKey { table, columns, .. } => {
                write!(f, "add primary key on {table} ({})", columns.join(", "))
            }
            Self::AddForeignKey { table, foreign_key } => {
                write!(f, "add foreign key {} on {table}", foreign_key.name)
            }
            Self::AddUniqueGroup { table, name, .. } => write!(f, "add unique {name} on {table}"),
            Self::DropForeignKey { foreign_key, .. } => write!(
                f,
                "drop foreign key {} on {}",
                foreign_key.constraint, foreign_key.table
            ),
            Self::DropUnique {
                table, constraint, ..
            } => write!(f, "drop unique {} on {table}", constraint.name),
            Self::DropColumn { table, column, .. } => {
                write!(f, "drop column {table}.{}", column.name)
            }
            Self::RebuildTable { table, .. } => write!(f, "rebuild table {}", table.name),
            Self::DropTable { table, .. } => write!(f, "drop table {table}"),
        }
    }
}

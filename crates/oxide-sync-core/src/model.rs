//! Target and live table models.
//!
//! The target side is produced by the extractor from entity descriptors, the
//! live side by an introspector reading the database catalog. Both describe
//! tables in the same vocabulary so the differ can compare them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::IdKind;
use crate::types::SemanticType;

/// Name of the implicit soft-delete column.
pub const INACTIVE_COLUMN: &str = "Inactive";

/// Name of the implicit id column.
pub const ID_COLUMN: &str = "Id";

/// Compares two identifiers, optionally ignoring ASCII case.
#[must_use]
pub fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// Replaces characters that cannot appear in an unquoted constraint name.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Semantic type.
    pub ty: SemanticType,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Member of the primary key.
    pub primary_key: bool,
    /// Identity, serial or generated uid.
    pub auto_generated: bool,
    /// Rendered with `DEFAULT <literal for type>`.
    pub defaulted: bool,
}

impl ColumnDescriptor {
    /// Creates a plain not-null column.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: SemanticType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            primary_key: false,
            auto_generated: false,
            defaulted: false,
        }
    }

    /// Sets nullability.
    #[must_use]
    pub const fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// How the primary key of a target table is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// Single `Id` column.
    Id(IdKind),
    /// Caller-defined key columns.
    Open {
        /// First key column is auto-incremented.
        auto_increment: bool,
    },
}

/// Declared foreign key of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    /// Source column.
    pub column: String,
    /// Referenced table.
    pub references_table: String,
    /// Referenced column.
    pub references_column: String,
    /// Nullability of the source column.
    pub nullable: bool,
}

/// Declared unique group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueGroupDescriptor {
    /// Group id.
    pub id: String,
    /// Participating columns, in declaration order.
    pub columns: Vec<String>,
}

/// Referential action on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeleteRule {
    /// Delete dependent rows.
    Cascade,
    /// Null out the referencing columns.
    SetNull,
    /// Reject the delete (checked at end of statement).
    NoAction,
    /// Reject the delete immediately.
    Restrict,
    /// Reset the referencing columns to their default.
    SetDefault,
}

impl DeleteRule {
    /// The rule derived from source column nullability.
    #[must_use]
    pub const fn for_nullability(nullable: bool) -> Self {
        if nullable {
            Self::SetNull
        } else {
            Self::Cascade
        }
    }

    /// Lower-case SQL spelling.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::SetNull => "set null",
            Self::NoAction => "no action",
            Self::Restrict => "restrict",
            Self::SetDefault => "set default",
        }
    }

    /// Parses a catalog spelling (`SET NULL`, `SET_NULL`, `cascade`, ...).
    ///
    /// Unknown spellings are read as [`DeleteRule::NoAction`], which is what
    /// every supported engine does when no rule was declared.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace('_', " ");
        match normalized.as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "RESTRICT" => Self::Restrict,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

impl fmt::Display for DeleteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A foreign key constraint as it will be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyGroup {
    /// Constraint name.
    pub name: String,
    /// Source columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub references_table: String,
    /// Referenced columns, parallel to `columns`.
    pub references_columns: Vec<String>,
    /// Delete rule.
    pub delete_rule: DeleteRule,
}

/// Target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Owning schema.
    pub schema: Option<String>,
    /// Ordered columns.
    pub columns: Vec<ColumnDescriptor>,
    /// Declared foreign keys.
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    /// Declared unique groups.
    pub unique_groups: Vec<UniqueGroupDescriptor>,
    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,
    /// Key shape.
    pub key: KeyKind,
    /// Carries the implicit `Inactive` column.
    pub soft_delete: bool,
}

impl TableDescriptor {
    /// Looks up a column.
    #[must_use]
    pub fn column(&self, name: &str, case_sensitive: bool) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| names_match(&c.name, name, case_sensitive))
    }

    /// Returns `true` for caller-keyed tables.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.key, KeyKind::Open { .. })
    }

    /// Name of the primary key constraint the engine creates.
    #[must_use]
    pub fn primary_key_name(&self) -> String {
        format!("pk_{}", sanitize_name(&self.name))
    }

    /// Name of the constraint backing a unique group.
    #[must_use]
    pub fn unique_name(&self, group: &UniqueGroupDescriptor) -> String {
        format!(
            "uq_{}_{}",
            sanitize_name(&self.name),
            sanitize_name(&group.id)
        )
    }

    /// Groups the declared foreign keys into constraints.
    ///
    /// References to the same table share one constraint, unless a
    /// referenced column repeats, which opens a new constraint named with a
    /// numeric suffix. The delete rule is `SET NULL` only when every source
    /// column is nullable.
    #[must_use]
    pub fn foreign_key_groups(&self) -> Vec<ForeignKeyGroup> {
        let mut groups: Vec<(ForeignKeyGroup, bool)> = Vec::new();

        for fk in &self.foreign_keys {
            let slot = groups.iter_mut().find(|(g, _)| {
                g.references_table == fk.references_table
                    && !g.references_columns.contains(&fk.references_column)
            });
            match slot {
                Some((group, all_nullable)) => {
                    group.columns.push(fk.column.clone());
                    group.references_columns.push(fk.references_column.clone());
                    *all_nullable &= fk.nullable;
                }
                None => {
                    let base = format!(
                        "fk_{}_{}",
                        sanitize_name(&self.name),
                        sanitize_name(&fk.references_table)
                    );
                    let taken = groups
                        .iter()
                        .filter(|(g, _)| g.references_table == fk.references_table)
                        .count();
                    let name = if taken == 0 {
                        base
                    } else {
                        format!("{base}_{}", taken + 1)
                    };
                    groups.push((
                        ForeignKeyGroup {
                            name,
                            columns: vec![fk.column.clone()],
                            references_table: fk.references_table.clone(),
                            references_columns: vec![fk.references_column.clone()],
                            delete_rule: DeleteRule::Cascade,
                        },
                        fk.nullable,
                    ));
                }
            }
        }

        groups
            .into_iter()
            .map(|(mut group, all_nullable)| {
                group.delete_rule = DeleteRule::for_nullability(all_nullable);
                group
            })
            .collect()
    }
}

/// Target model of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetModel {
    /// Tables in declaration order.
    pub tables: Vec<TableDescriptor>,
}

impl TargetModel {
    /// Looks up a table.
    #[must_use]
    pub fn table(&self, name: &str, case_sensitive: bool) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| names_match(&t.name, name, case_sensitive))
    }
}

/// Foreign key membership of a live column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveForeignKey {
    /// Constraint name.
    pub constraint: String,
    /// Referenced table.
    pub references_table: String,
    /// Referenced column.
    pub references_column: String,
    /// Delete rule reported by the catalog.
    pub delete_rule: DeleteRule,
}

/// Introspected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumnInfo {
    /// Column name.
    pub name: String,
    /// Dialect type string as reported by the catalog.
    pub raw_type: String,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Default expression, if any.
    pub default: Option<String>,
    /// Member of the primary key.
    pub primary_key: bool,
    /// Identity / serial / auto-increment marker.
    pub auto_increment: bool,
    /// Foreign key this column belongs to.
    pub foreign_key: Option<LiveForeignKey>,
}

impl LiveColumnInfo {
    /// Creates a not-null column with no constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_type: raw_type.into(),
            nullable: false,
            default: None,
            primary_key: false,
            auto_increment: false,
            foreign_key: None,
        }
    }
}

/// Introspected unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUniqueConstraint {
    /// Constraint (or index) name.
    pub name: String,
    /// Columns in key order.
    pub columns: Vec<String>,
}

/// A live foreign key constraint, reassembled from its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveForeignKeyGroup {
    /// Table owning the constraint.
    pub table: String,
    /// Constraint name.
    pub constraint: String,
    /// Source columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub references_table: String,
    /// Referenced columns, parallel to `columns`.
    pub references_columns: Vec<String>,
    /// Delete rule.
    pub delete_rule: DeleteRule,
}

/// Introspected table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTable {
    /// Table name as stored.
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<LiveColumnInfo>,
    /// Primary key column names.
    pub primary_key: Vec<String>,
    /// Primary key constraint name, where the dialect names it.
    pub primary_key_constraint: Option<String>,
    /// Unique constraints.
    pub unique_constraints: Vec<LiveUniqueConstraint>,
}

impl LiveTable {
    /// Looks up a column.
    #[must_use]
    pub fn column(&self, name: &str, case_sensitive: bool) -> Option<&LiveColumnInfo> {
        self.columns
            .iter()
            .find(|c| names_match(&c.name, name, case_sensitive))
    }

    /// Reassembles foreign key constraints from column membership.
    #[must_use]
    pub fn foreign_key_groups(&self) -> Vec<LiveForeignKeyGroup> {
        let mut groups: Vec<LiveForeignKeyGroup> = Vec::new();
        for column in &self.columns {
            let Some(fk) = &column.foreign_key else {
                continue;
            };
            if let Some(group) = groups.iter_mut().find(|g| g.constraint == fk.constraint) {
                group.columns.push(column.name.clone());
                group.references_columns.push(fk.references_column.clone());
            } else {
                groups.push(LiveForeignKeyGroup {
                    table: self.name.clone(),
                    constraint: fk.constraint.clone(),
                    columns: vec![column.name.clone()],
                    references_table: fk.references_table.clone(),
                    references_columns: vec![fk.references_column.clone()],
                    delete_rule: fk.delete_rule,
                });
            }
        }
        groups
    }
}

/// Live model of one database schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveModel {
    /// Schema / namespace that was introspected.
    pub schema: String,
    /// Tables keyed by stored name.
    pub tables: BTreeMap<String, LiveTable>,
}

impl LiveModel {
    /// Creates an empty model, i.e. a fresh database.
    #[must_use]
    pub fn empty(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Adds a table.
    pub fn insert(&mut self, table: LiveTable) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Looks up a table, folding case when the dialect does.
    #[must_use]
    pub fn find_table(&self, name: &str, case_sensitive: bool) -> Option<&LiveTable> {
        self.tables.get(name).or_else(|| {
            if case_sensitive {
                None
            } else {
                self.tables
                    .values()
                    .find(|t| t.name.eq_ignore_ascii_case(name))
            }
        })
    }

    /// All foreign keys in the schema.
    #[must_use]
    pub fn foreign_key_groups(&self) -> Vec<LiveForeignKeyGroup> {
        self.tables
            .values()
            .flat_map(LiveTable::foreign_key_groups)
            .collect()
    }
}

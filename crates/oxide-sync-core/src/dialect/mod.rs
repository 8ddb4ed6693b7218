//! Dialect adapters.
//!
//! Each backend knows how to quote identifiers, name its native types, shape
//! primary key columns and spell every [`Operation`] as literal SQL. The
//! differ and the execution coordinator only ever talk to the
//! [`DialectAdapter`] trait, chosen once per run from a [`Dialect`].

mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use mssql::SqlServerAdapter;
pub use mysql::MySqlAdapter;
pub use oracle::OracleAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

use crate::entity::IdKind;
use crate::error::{Result, SyncError};
use crate::model::{ColumnDescriptor, ForeignKeyGroup, KeyKind, TableDescriptor, names_match};
use crate::operation::{CopySource, Operation};
use crate::types::SemanticType;

/// Supported SQL backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Microsoft SQL Server (T-SQL).
    SqlServer,
    /// MySQL / MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
    /// Oracle Database.
    Oracle,
}

impl Dialect {
    /// Every dialect.
    pub const ALL: [Self; 5] = [
        Self::SqlServer,
        Self::MySql,
        Self::Postgres,
        Self::Sqlite,
        Self::Oracle,
    ];

    /// Returns the adapter for this dialect.
    #[must_use]
    pub fn adapter(self) -> Box<dyn DialectAdapter> {
        match self {
            Self::SqlServer => Box::new(SqlServerAdapter::new()),
            Self::MySql => Box::new(MySqlAdapter::new()),
            Self::Postgres => Box::new(PostgresAdapter::new()),
            Self::Sqlite => Box::new(SqliteAdapter::new()),
            Self::Oracle => Box::new(OracleAdapter::new()),
        }
    }

    /// Short lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::Oracle => "oracle",
        }
    }

    /// Guesses the dialect from a connection URL scheme.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            "mssql" | "sqlserver" => Some(Self::SqlServer),
            "oracle" => Some(Self::Oracle),
            _ => None,
        }
    }

    /// Schema used when none is configured.
    ///
    /// `None` means the schema is the connection's own database (MySQL) or
    /// user (Oracle) and has to be asked for.
    #[must_use]
    pub const fn default_schema(self) -> Option<&'static str> {
        match self {
            Self::SqlServer => Some("dbo"),
            Self::Postgres => Some("public"),
            Self::Sqlite => Some("main"),
            Self::MySql | Self::Oracle => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown dialect name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dialect '{0}' (expected one of: sqlserver, mysql, postgres, sqlite, oracle)")]
pub struct ParseDialectError(pub String);

impl FromStr for Dialect {
    type Err = ParseDialectError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" | "tsql" | "t-sql" => Ok(Self::SqlServer),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            "oracle" => Ok(Self::Oracle),
            _ => Err(ParseDialectError(s.to_string())),
        }
    }
}

/// DDL capabilities that select the execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Columns and constraints can be altered in place.
    pub alter_column: bool,
    /// DDL participates in transactions.
    pub transactional_ddl: bool,
}

/// Words that must be quoted on dialects that otherwise leave names bare.
const RESERVED: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN",
    "CONSTRAINT", "CREATE", "CROSS", "CURRENT", "DATABASE", "DEFAULT", "DELETE", "DESC",
    "DISTINCT", "DROP", "ELSE", "END", "EXISTS", "FOREIGN", "FROM", "FULL", "FUNCTION", "GRANT",
    "GROUP", "HAVING", "IN", "INDEX", "INNER", "INSERT", "INTO", "IS", "JOIN", "KEY", "LEFT",
    "LIKE", "LIMIT", "NOT", "NULL", "OF", "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES",
    "RIGHT", "ROW", "SCHEMA", "SELECT", "SET", "TABLE", "THEN", "TO", "TRIGGER", "UNION",
    "UNIQUE", "UPDATE", "USER", "USING", "VALUES", "VIEW", "WHEN", "WHERE", "WITH",
];

/// Returns `true` when `name` cannot be used as a bare identifier.
#[must_use]
pub fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return true;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return true;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return true;
    }
    RESERVED.iter().any(|word| word.eq_ignore_ascii_case(name))
}

/// Renders a string literal with single quotes doubled.
#[must_use]
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Backend-specific SQL generation.
pub trait DialectAdapter: Send + Sync {
    /// The dialect this adapter speaks.
    fn dialect(&self) -> Dialect;

    /// DDL capabilities.
    fn capabilities(&self) -> Capabilities;

    /// Whether every identifier is quoted, not only irregular ones.
    fn requires_quoting(&self) -> bool {
        true
    }

    /// Opening and closing quote characters.
    fn quote_chars(&self) -> (char, char) {
        ('"', '"')
    }

    /// Quotes an identifier when the dialect needs it.
    fn quote_identifier(&self, name: &str) -> String {
        if !self.requires_quoting() && !needs_quotes(name) {
            return name.to_string();
        }
        let (open, close) = self.quote_chars();
        let escaped = name.replace(close, &format!("{close}{close}"));
        format!("{open}{escaped}{close}")
    }

    /// Whether stored identifiers compare case-sensitively.
    fn case_sensitive_identifiers(&self) -> bool {
        true
    }

    /// Compares two identifiers under the dialect's case rules.
    fn same_identifier(&self, a: &str, b: &str) -> bool {
        names_match(a, b, self.case_sensitive_identifiers())
    }

    /// Longest identifier the dialect accepts.
    fn max_identifier_length(&self) -> usize {
        128
    }

    /// A generated constraint name, truncated to the identifier limit.
    fn constraint_name(&self, name: &str) -> String {
        name.chars().take(self.max_identifier_length()).collect()
    }

    /// A generated constraint name as written in DDL: truncated, and quoted
    /// only when irregular.
    fn constraint_identifier(&self, name: &str) -> String {
        let name = self.constraint_name(name);
        if needs_quotes(&name) {
            self.stored_identifier(&name)
        } else {
            name
        }
    }

    /// How the catalog stores an unquoted identifier.
    fn fold_identifier(&self, name: &str) -> String {
        name.to_string()
    }

    /// Catalog name of a generated constraint written with
    /// [`Self::constraint_identifier`].
    fn stored_constraint_name(&self, name: &str) -> String {
        let name = self.constraint_name(name);
        if needs_quotes(&name) {
            name
        } else {
            self.fold_identifier(&name)
        }
    }

    /// A name read from the catalog, always quoted so its stored case holds.
    fn stored_identifier(&self, name: &str) -> String {
        let (open, close) = self.quote_chars();
        format!("{open}{}{close}", name.replace(close, &format!("{close}{close}")))
    }

    /// Native type name, `None` if the type has no mapping.
    fn type_name(&self, ty: &SemanticType) -> Option<String>;

    /// Native type name, or [`SyncError::UnsupportedType`].
    ///
    /// # Errors
    ///
    /// Fails when the type has no mapping in this dialect.
    fn native_type(&self, table: &str, column: &str, ty: &SemanticType) -> Result<String> {
        self.type_name(ty).ok_or_else(|| SyncError::UnsupportedType {
            entity: table.to_string(),
            property: column.to_string(),
            ty: ty.clone(),
            dialect: self.dialect(),
        })
    }

    /// Full definition of the implicit `Id` column, primary key included.
    fn id_column(&self, name: &str, kind: IdKind) -> String;

    /// Definition of the auto-incremented key column of an open entity.
    ///
    /// # Errors
    ///
    /// Fails when the column type has no mapping.
    fn auto_increment_column(&self, table: &TableDescriptor, column: &ColumnDescriptor)
        -> Result<String>;

    /// Whether the open entity's key is already declared on its column.
    fn inlines_open_key(&self, _table: &TableDescriptor) -> bool {
        false
    }

    /// Literal used to fill a not-null column, `None` for unmapped types.
    fn default_literal(&self, ty: &SemanticType) -> Option<String>;

    /// Literal used to fill a not-null column.
    ///
    /// # Errors
    ///
    /// Fails when the type has no mapping.
    fn required_default(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        self.default_literal(&column.ty)
            .ok_or_else(|| SyncError::UnsupportedType {
                entity: table.to_string(),
                property: column.name.clone(),
                ty: column.ty.clone(),
                dialect: self.dialect(),
            })
    }

    /// Statement opening a transaction.
    fn begin_transaction(&self) -> &'static str {
        "BEGIN"
    }

    /// Statement committing a transaction.
    fn commit_transaction(&self) -> &'static str {
        "COMMIT"
    }

    /// Statement rolling back a transaction.
    fn rollback_transaction(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Statements pointing the session at `schema`, run before introspection.
    ///
    /// `create` allows creating the schema when it is missing.
    fn prepare_session(&self, _schema: &str, _create: bool) -> Vec<String> {
        Vec::new()
    }

    /// Comma-separated quoted column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Column definition: name, type, optional default, nullability.
    ///
    /// # Errors
    ///
    /// Fails when the column type has no mapping.
    fn column_definition(
        &self,
        table: &str,
        column: &ColumnDescriptor,
        with_default: bool,
    ) -> Result<String> {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.native_type(table, &column.name, &column.ty)?,
        ];
        if with_default {
            parts.push(format!("DEFAULT {}", self.required_default(table, column)?));
        }
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        Ok(parts.join(" "))
    }

    /// `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...` clause.
    fn foreign_key_clause(&self, identifier: &str, fk: &ForeignKeyGroup) -> String {
        let mut clause = format!(
            "CONSTRAINT {identifier} FOREIGN KEY ({}) REFERENCES {}({})",
            self.column_list(&fk.columns),
            self.quote_identifier(&fk.references_table),
            self.column_list(&fk.references_columns)
        );
        if fk.delete_rule != crate::model::DeleteRule::NoAction {
            clause.push_str(" on delete ");
            clause.push_str(fk.delete_rule.as_sql());
        }
        clause
    }

    /// `CONSTRAINT ... UNIQUE (...)` clause.
    fn unique_clause(&self, identifier: &str, columns: &[String]) -> String {
        format!(
            "CONSTRAINT {identifier} UNIQUE ({})",
            self.column_list(columns)
        )
    }

    /// Generates SQL for CREATE TABLE.
    ///
    /// # Errors
    ///
    /// Fails when a column type has no mapping.
    fn create_table(&self, table: &TableDescriptor, inline_constraints: bool) -> Result<String> {
        let mut lines = Vec::with_capacity(table.columns.len() + 1);
        let auto_key = match table.key {
            KeyKind::Open {
                auto_increment: true,
            } => table.primary_key.first(),
            _ => None,
        };

        for column in &table.columns {
            let definition = match table.key {
                KeyKind::Id(kind) if column.primary_key => self.id_column(&column.name, kind),
                _ if auto_key.is_some_and(|k| self.same_identifier(k, &column.name)) => {
                    self.auto_increment_column(table, column)?
                }
                _ => self.column_definition(&table.name, column, column.defaulted)?,
            };
            lines.push(definition);
        }

        if table.is_open() && !self.inlines_open_key(table) {
            lines.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.constraint_identifier(&table.primary_key_name()),
                self.column_list(&table.primary_key)
            ));
        }

        if inline_constraints {
            for fk in table.foreign_key_groups() {
                lines.push(self.foreign_key_clause(&self.constraint_identifier(&fk.name), &fk));
            }
            for group in &table.unique_groups {
                let identifier = self.constraint_identifier(&table.unique_name(group));
                lines.push(self.unique_clause(&identifier, &group.columns));
            }
        }

        let body: Vec<String> = lines.iter().map(|l| format!("    {l}")).collect();
        Ok(format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_identifier(&table.name),
            body.join(",\n")
        ))
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Generates SQL for renaming a table.
    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// Wraps a column definition in an ADD COLUMN statement.
    fn add_column_sql(&self, table: &str, definition: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {definition}",
            self.quote_identifier(table)
        )
    }

    /// Generates SQL for ADD COLUMN.
    ///
    /// Not-null columns carry a default so existing rows stay valid.
    ///
    /// # Errors
    ///
    /// Fails when the column type has no mapping.
    fn add_column(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        let with_default = column.defaulted || !column.nullable;
        let definition = self.column_definition(table, column, with_default)?;
        Ok(self.add_column_sql(table, &definition))
    }

    /// Generates SQL for DROP COLUMN.
    fn drop_column(&self, table: &str, column: &str, _has_default: bool) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL flipping nullability.
    ///
    /// # Errors
    ///
    /// Fails on dialects that cannot alter a column in place.
    fn set_nullability(
        &self,
        table: &str,
        column: &str,
        _raw_type: &str,
        nullable: bool,
    ) -> Result<String> {
        let action = if nullable {
            "DROP NOT NULL"
        } else {
            "SET NOT NULL"
        };
        Ok(format!(
            "ALTER TABLE {} ALTER COLUMN {} {action}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        ))
    }

    /// Generates the NULL backfill preceding a NOT NULL flip.
    ///
    /// # Errors
    ///
    /// Fails when the column type has no mapping.
    fn backfill(&self, table: &str, column: &ColumnDescriptor) -> Result<String> {
        let column_name = self.quote_identifier(&column.name);
        Ok(format!(
            "UPDATE {} SET {column_name} = {} WHERE {column_name} IS NULL",
            self.quote_identifier(table),
            self.required_default(table, column)?
        ))
    }

    // Constraint statements take the constraint as written in DDL: generated
    // names through `constraint_identifier`, catalog names through
    // `stored_identifier`.

    /// Generates SQL adding a primary key.
    fn add_primary_key(&self, table: &str, identifier: &str, columns: &[String]) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {identifier} PRIMARY KEY ({})",
            self.quote_identifier(table),
            self.column_list(columns)
        )
    }

    /// Generates SQL dropping the primary key.
    ///
    /// # Errors
    ///
    /// Fails when the dialect needs a constraint name and none is known.
    fn drop_primary_key(&self, table: &str, identifier: Option<&str>) -> Result<String> {
        let identifier = identifier.ok_or_else(|| SyncError::Unsupported {
            dialect: self.dialect(),
            operation: format!("dropping the unnamed primary key of {table}"),
        })?;
        Ok(self.drop_constraint(table, identifier))
    }

    /// Generates `ALTER TABLE ... DROP CONSTRAINT ...`.
    fn drop_constraint(&self, table: &str, identifier: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {identifier}",
            self.quote_identifier(table)
        )
    }

    /// Generates SQL adding a foreign key.
    fn add_foreign_key(&self, table: &str, identifier: &str, fk: &ForeignKeyGroup) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_clause(identifier, fk)
        )
    }

    /// Generates SQL dropping a foreign key.
    fn drop_foreign_key(&self, table: &str, identifier: &str) -> String {
        self.drop_constraint(table, identifier)
    }

    /// Generates SQL adding a unique constraint.
    fn add_unique(&self, table: &str, identifier: &str, columns: &[String]) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.unique_clause(identifier, columns)
        )
    }

    /// Generates SQL dropping a unique constraint.
    fn drop_unique(&self, table: &str, identifier: &str) -> String {
        self.drop_constraint(table, identifier)
    }

    /// Generates the shadow-copy rebuild sequence.
    ///
    /// # Errors
    ///
    /// Fails when a column type has no mapping.
    fn rebuild_table(
        &self,
        table: &TableDescriptor,
        shadow: &str,
        copy: &[crate::operation::CopyColumn],
    ) -> Result<Vec<String>> {
        let mut statements = vec![
            self.rename_table(&table.name, shadow),
            self.create_table(table, true)?,
        ];

        if !copy.is_empty() {
            let targets: Vec<String> = copy.iter().map(|c| c.target.clone()).collect();
            let mut values = Vec::with_capacity(copy.len());
            for column in copy {
                let value = match &column.source {
                    CopySource::Column(name) => self.quote_identifier(name),
                    CopySource::Coalesce(name, ty) => format!(
                        "COALESCE({}, {})",
                        self.quote_identifier(name),
                        self.copy_default(&table.name, &column.target, ty)?
                    ),
                    CopySource::Default(ty) => {
                        self.copy_default(&table.name, &column.target, ty)?
                    }
                };
                values.push(value);
            }
            statements.push(format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                self.quote_identifier(&table.name),
                self.column_list(&targets),
                values.join(", "),
                self.quote_identifier(shadow)
            ));
        }

        statements.push(self.drop_table(shadow));
        Ok(statements)
    }

    /// Default literal for a rebuild copy column.
    ///
    /// # Errors
    ///
    /// Fails when the type has no mapping.
    fn copy_default(&self, table: &str, column: &str, ty: &SemanticType) -> Result<String> {
        self.required_default(table, &ColumnDescriptor::new(column, ty.clone()))
    }

    /// Renders an operation as literal statements.
    ///
    /// # Errors
    ///
    /// Fails on unmapped types or operations the dialect cannot express.
    fn render(&self, op: &Operation) -> Result<Vec<String>> {
        let statements = match op {
            Operation::CreateTable {
                table,
                inline_constraints,
            } => vec![self.create_table(table, *inline_constraints)?],
            Operation::AddColumn { table, column } => vec![self.add_column(table, column)?],
            Operation::Backfill { table, column } => vec![self.backfill(table, column)?],
            Operation::SetNotNull {
                table, column, live, ..
            } => vec![self.set_nullability(table, &column.name, &live.raw_type, false)?],
            Operation::DropNotNull {
                table, column, live,
            } => vec![self.set_nullability(table, &column.name, &live.raw_type, true)?],
            Operation::DropPrimaryKey {
                table, constraint, ..
            } => {
                let identifier = constraint.as_deref().map(|c| self.stored_identifier(c));
                vec![self.drop_primary_key(table, identifier.as_deref())?]
            }
            Operation::AddPrimaryKey {
                table,
                name,
                columns,
            } => vec![self.add_primary_key(table, &self.constraint_identifier(name), columns)],
            Operation::AddForeignKey { table, foreign_key } => {
                let identifier = self.constraint_identifier(&foreign_key.name);
                vec![self.add_foreign_key(table, &identifier, foreign_key)]
            }
            Operation::AddUniqueGroup {
                table,
                name,
                columns,
            } => vec![self.add_unique(table, &self.constraint_identifier(name), columns)],
            Operation::DropForeignKey { foreign_key, .. } => vec![self.drop_foreign_key(
                &foreign_key.table,
                &self.stored_identifier(&foreign_key.constraint),
            )],
            Operation::DropUnique {
                table, constraint, ..
            } => vec![self.drop_unique(table, &self.stored_identifier(&constraint.name))],
            Operation::DropColumn { table, column, .. } => {
                vec![self.drop_column(table, &column.name, column.default.is_some())]
            }
            Operation::RebuildTable {
                table, shadow, copy, ..
            } => self.rebuild_table(table, shadow, copy)?,
            Operation::DropTable { table, .. } => vec![self.drop_table(table)],
        };
        Ok(statements)
    }

    /// Statements undoing `op` after it was applied.
    ///
    /// Dropped data cannot be restored: a compensated column drop comes back
    /// empty and nullable. Backfills, rebuilds and table drops have no
    /// compensation.
    ///
    /// # Errors
    ///
    /// Fails when the inverse cannot be expressed.
    fn compensate(&self, op: &Operation) -> Result<Vec<String>> {
        let statements = match op {
            Operation::CreateTable { table, .. } => vec![self.drop_table(&table.name)],
            Operation::AddColumn { table, column } => {
                vec![self.drop_column(table, &column.name, column.defaulted || !column.nullable)]
            }
            Operation::SetNotNull {
                table, column, live, ..
            } => vec![self.set_nullability(table, &column.name, &live.raw_type, true)?],
            Operation::DropNotNull {
                table, column, live,
            } => vec![self.set_nullability(table, &column.name, &live.raw_type, false)?],
            Operation::DropPrimaryKey {
                table,
                constraint,
                columns,
                ..
            } => {
                let identifier = constraint.as_deref().map_or_else(
                    || {
                        self.constraint_identifier(&format!(
                            "pk_{}",
                            crate::model::sanitize_name(table)
                        ))
                    },
                    |c| self.stored_identifier(c),
                );
                vec![self.add_primary_key(table, &identifier, columns)]
            }
            Operation::AddPrimaryKey { table, name, .. } => {
                let identifier = self.stored_identifier(&self.stored_constraint_name(name));
                vec![self.drop_primary_key(table, Some(identifier.as_str()))?]
            }
            Operation::AddForeignKey { table, foreign_key } => {
                let stored = self.stored_constraint_name(&foreign_key.name);
                vec![self.drop_foreign_key(table, &self.stored_identifier(&stored))]
            }
            Operation::AddUniqueGroup { table, name, .. } => {
                let stored = self.stored_constraint_name(name);
                vec![self.drop_unique(table, &self.stored_identifier(&stored))]
            }
            Operation::DropForeignKey { foreign_key, .. } => {
                let restored = ForeignKeyGroup {
                    name: foreign_key.constraint.clone(),
                    columns: foreign_key.columns.clone(),
                    references_table: foreign_key.references_table.clone(),
                    references_columns: foreign_key.references_columns.clone(),
                    delete_rule: foreign_key.delete_rule,
                };
                let identifier = self.stored_identifier(&foreign_key.constraint);
                vec![self.add_foreign_key(&foreign_key.table, &identifier, &restored)]
            }
            Operation::DropUnique {
                table, constraint, ..
            } => {
                let identifier = self.stored_identifier(&constraint.name);
                vec![self.add_unique(table, &identifier, &constraint.columns)]
            }
            Operation::DropColumn { table, column, .. } => {
                let definition =
                    format!("{} {}", self.quote_identifier(&column.name), column.raw_type);
                vec![self.add_column_sql(table, &definition)]
            }
            Operation::Backfill { .. }
            | Operation::RebuildTable { .. }
            | Operation::DropTable { .. } => Vec::new(),
        };
        Ok(statements)
    }
}

//! MySQL / MariaDB dialect.
//!
//! DDL statements commit implicitly in MySQL, so the transaction wrapping the
//! run only protects the data-changing statements (backfills); a failure half
//! way through the schema changes leaves the earlier DDL applied.

use super::{Capabilities, Dialect, DialectAdapter, sql_literal};
use crate::entity::IdKind;
use crate::error::Result;
use crate::model::{ColumnDescriptor, TableDescriptor};
use crate::types::SemanticType;

/// Longest VARCHAR kept inline before switching to LONGTEXT.
const MAX_VARCHAR: u32 = 16_383;

/// MySQL adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlAdapter;

impl MySqlAdapter {
    /// Creates a new MySQL adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectAdapter for MySqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            alter_column: true,
            transactional_ddl: true,
        }
    }

    fn requires_quoting(&self) -> bool {
        false
    }

    fn quote_chars(&self) -> (char, char) {
        ('`', '`')
    }

    fn case_sensitive_identifiers(&self) -> bool {
        false
    }

    fn max_identifier_length(&self) -> usize {
        64
    }

    fn type_name(&self, ty: &SemanticType) -> Option<String> {
        let name = match ty {
            SemanticType::Byte => "TINYINT UNSIGNED".to_string(),
            SemanticType::Boolean => "TINYINT(1)".to_string(),
            SemanticType::Short => "SMALLINT".to_string(),
            SemanticType::Integer => "INT".to_string(),
            SemanticType::Long => "BIGINT".to_string(),
            SemanticType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            SemanticType::Float => "FLOAT".to_string(),
            SemanticType::Double => "DOUBLE".to_string(),
            SemanticType::DateTime => "DATETIME(6)".to_string(),
            SemanticType::Time => "TIME(6)".to_string(),
            SemanticType::Uid => "CHAR(36)".to_string(),
            SemanticType::Text(Some(n)) if *n <= MAX_VARCHAR => format!("VARCHAR({n})"),
            SemanticType::Text(_) => "LONGTEXT".to_string(),
            SemanticType::Blob => "LONGBLOB".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(name)
    }

    fn id_column(&self, name: &str, kind: IdKind) -> String {
        let name = self.quote_identifier(name);
        match kind {
            IdKind::AutoIncrement => format!("{name} INT AUTO_INCREMENT PRIMARY KEY"),
            IdKind::GeneratedUid => format!("{name} CHAR(36) DEFAULT (UUID()) PRIMARY KEY"),
            IdKind::CallerString => format!("{name} VARCHAR(255) PRIMARY KEY"),
        }
    }

    fn auto_increment_column(
        &self,
        table: &TableDescriptor,
        column: &ColumnDescriptor,
    ) -> Result<String> {
        Ok(format!(
            "{} {} NOT NULL AUTO_INCREMENT",
            self.quote_identifier(&column.name),
            self.native_type(&table.name, &column.name, &column.ty)?
        ))
    }

    fn default_literal(&self, ty: &SemanticType) -> Option<String> {
        // TEXT and BLOB columns only accept expression defaults
        let literal = match ty {
            SemanticType::Byte
            | SemanticType::Boolean
            | SemanticType::Short
            | SemanticType::Integer
            | SemanticType::Long
            | SemanticType::Decimal { .. }
            | SemanticType::Float
            | SemanticType::Double => "0".to_string(),
            SemanticType::DateTime => "CURRENT_TIMESTAMP(6)".to_string(),
            SemanticType::Time => sql_literal("00:00:00"),
            SemanticType::Uid => sql_literal("00000000-0000-0000-0000-000000000000"),
            SemanticType::Text(_) => format!("({})", sql_literal("")),
            SemanticType::Blob => "(X'')".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(literal)
    }

    fn begin_transaction(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn prepare_session(&self, schema: &str, _create: bool) -> Vec<String> {
        vec![format!("USE {}", self.quote_identifier(schema))]
    }

    fn set_nullability(
        &self,
        table: &str,
        column: &str,
        raw_type: &str,
        nullable: bool,
    ) -> Result<String> {
        let null = if nullable { "NULL" } else { "NOT NULL" };
        Ok(format!(
            "ALTER TABLE {} MODIFY COLUMN {} {raw_type} {null}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        ))
    }

    fn drop_primary_key(&self, table: &str, _identifier: Option<&str>) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP PRIMARY KEY",
            self.quote_identifier(table)
        ))
    }

    fn drop_foreign_key(&self, table: &str, identifier: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {identifier}",
            self.quote_identifier(table)
        )
    }

    fn drop_unique(&self, table: &str, identifier: &str) -> String {
        format!(
            "ALTER TABLE {} DROP INDEX {identifier}",
            self.quote_identifier(table)
        )
    }
}

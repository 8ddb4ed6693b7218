//! Microsoft SQL Server (T-SQL) dialect.

use super::{Capabilities, Dialect, DialectAdapter, sql_literal};
use crate::entity::IdKind;
use crate::error::Result;
use crate::model::{ColumnDescriptor, TableDescriptor};
use crate::types::SemanticType;

/// Longest NVARCHAR that is not NVARCHAR(MAX).
const MAX_NVARCHAR: u32 = 4000;

/// SQL Server adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerAdapter;

impl SqlServerAdapter {
    /// Creates a new SQL Server adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Unicode string literal.
    fn n_literal(value: &str) -> String {
        format!("N{}", sql_literal(value))
    }
}

impl DialectAdapter for SqlServerAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
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
        ('[', ']')
    }

    fn case_sensitive_identifiers(&self) -> bool {
        false
    }

    fn type_name(&self, ty: &SemanticType) -> Option<String> {
        let name = match ty {
            SemanticType::Byte => "TINYINT".to_string(),
            SemanticType::Boolean => "BIT".to_string(),
            SemanticType::Short => "SMALLINT".to_string(),
            SemanticType::Integer => "INT".to_string(),
            SemanticType::Long => "BIGINT".to_string(),
            SemanticType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            SemanticType::Float => "REAL".to_string(),
            SemanticType::Double => "FLOAT".to_string(),
            SemanticType::DateTime => "DATETIME2".to_string(),
            SemanticType::Time => "TIME".to_string(),
            SemanticType::Uid => "UNIQUEIDENTIFIER".to_string(),
            SemanticType::Text(Some(n)) if *n <= MAX_NVARCHAR => format!("NVARCHAR({n})"),
            SemanticType::Text(_) => "NVARCHAR(MAX)".to_string(),
            SemanticType::Blob => "VARBINARY(MAX)".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(name)
    }

    fn id_column(&self, name: &str, kind: IdKind) -> String {
        let name = self.quote_identifier(name);
        match kind {
            IdKind::AutoIncrement => format!("{name} INT IDENTITY(1,1) PRIMARY KEY"),
            IdKind::GeneratedUid => format!("{name} UNIQUEIDENTIFIER DEFAULT NEWID() PRIMARY KEY"),
            IdKind::CallerString => format!("{name} NVARCHAR(255) PRIMARY KEY"),
        }
    }

    fn auto_increment_column(
        &self,
        table: &TableDescriptor,
        column: &ColumnDescriptor,
    ) -> Result<String> {
        Ok(format!(
            "{} {} IDENTITY(1,1) NOT NULL",
            self.quote_identifier(&column.name),
            self.native_type(&table.name, &column.name, &column.ty)?
        ))
    }

    fn default_literal(&self, ty: &SemanticType) -> Option<String> {
        let literal = match ty {
            SemanticType::Byte
            | SemanticType::Boolean
            | SemanticType::Short
            | SemanticType::Integer
            | SemanticType::Long
            | SemanticType::Decimal { .. }
            | SemanticType::Float
            | SemanticType::Double => "0".to_string(),
            SemanticType::DateTime => "CURRENT_TIMESTAMP".to_string(),
            SemanticType::Time => sql_literal("00:00:00"),
            SemanticType::Uid => sql_literal("00000000-0000-0000-0000-000000000000"),
            SemanticType::Text(_) => Self::n_literal(""),
            SemanticType::Blob => "0x".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(literal)
    }

    fn begin_transaction(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn commit_transaction(&self) -> &'static str {
        "COMMIT TRANSACTION"
    }

    fn rollback_transaction(&self) -> &'static str {
        "ROLLBACK TRANSACTION"
    }

    fn add_column_sql(&self, table: &str, definition: &str) -> String {
        format!("ALTER TABLE {} ADD {definition}", self.quote_identifier(table))
    }

    fn drop_column(&self, table: &str, column: &str, has_default: bool) -> String {
        let quoted_table = self.quote_identifier(table);
        let drop = format!(
            "ALTER TABLE {quoted_table} DROP COLUMN {}",
            self.quote_identifier(column)
        );
        if !has_default {
            return drop;
        }
        // A column bound to a default constraint cannot be dropped directly.
        format!(
            "DECLARE @df sysname; \
             SELECT @df = dc.name FROM sys.default_constraints dc \
             JOIN sys.columns c ON c.default_object_id = dc.object_id \
             WHERE dc.parent_object_id = OBJECT_ID({}) AND c.name = {}; \
             IF @df IS NOT NULL EXEC({} + QUOTENAME(@df)); {drop}",
            Self::n_literal(table),
            Self::n_literal(column),
            Self::n_literal(&format!("ALTER TABLE {quoted_table} DROP CONSTRAINT ")),
        )
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
            "ALTER TABLE {} ALTER COLUMN {} {raw_type} {null}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotes_only_when_needed() {
        let ms = SqlServerAdapter::new();
        assert_eq!(ms.quote_identifier("Customer"), "Customer");
        assert_eq!(ms.quote_identifier("Order"), "[Order]");
        assert_eq!(ms.quote_identifier("odd]name"), "[odd]]name]");
    }

    #[test]
    fn test_type_names() {
        let ms = SqlServerAdapter::new();
        assert_eq!(ms.type_name(&SemanticType::Text(Some(100))).unwrap(), "NVARCHAR(100)");
        assert_eq!(ms.type_name(&SemanticType::Text(Some(5000))).unwrap(), "NVARCHAR(MAX)");
        assert_eq!(ms.type_name(&SemanticType::Boolean).unwrap(), "BIT");
        assert_eq!(ms.type_name(&SemanticType::DateTime).unwrap(), "DATETIME2");
    }

    #[test]
    fn test_id_columns() {
        let ms = SqlServerAdapter::new();
        assert_eq!(ms.id_column("Id", IdKind::AutoIncrement), "Id INT IDENTITY(1,1) PRIMARY KEY");
        assert_eq!(
            ms.id_column("Id", IdKind::GeneratedUid),
            "Id UNIQUEIDENTIFIER DEFAULT NEWID() PRIMARY KEY"
        );
    }

    #[test]
    fn test_add_column_with_default() {
        let ms = SqlServerAdapter::new();
        let column = ColumnDescriptor::new("Code", SemanticType::Text(Some(10)));
        assert_eq!(
            ms.add_column("Customer", &column).unwrap(),
            "ALTER TABLE Customer ADD Code NVARCHAR(10) DEFAULT N'' NOT NULL"
        );
    }

    #[test]
    fn test_drop_column_clears_default_constraint() {
        let ms = SqlServerAdapter::new();
        assert_eq!(
            ms.drop_column("Customer", "Code", false),
            "ALTER TABLE Customer DROP COLUMN Code"
        );
        let sql = ms.drop_column("Customer", "Code", true);
        assert!(sql.contains("sys.default_constraints"));
        assert!(sql.contains("OBJECT_ID(N'Customer')"));
        assert!(sql.ends_with("ALTER TABLE Customer DROP COLUMN Code"));
    }

    #[test]
    fn test_nullability_restates_type() {
        let ms = SqlServerAdapter::new();
        assert_eq!(
            ms.set_nullability("Customer", "Code", "nvarchar(10)", false).unwrap(),
            "ALTER TABLE Customer ALTER COLUMN Code nvarchar(10) NOT NULL"
        );
    }
}

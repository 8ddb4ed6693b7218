//! Oracle dialect.
//!
//! Oracle commits every DDL statement on its own, so runs execute statement
//! by statement and undo applied changes with compensating statements.

use super::{Capabilities, Dialect, DialectAdapter};
use crate::entity::IdKind;
use crate::error::Result;
use crate::model::{ColumnDescriptor, TableDescriptor};
use crate::types::SemanticType;

/// Longest NVARCHAR2 before switching to NCLOB.
const MAX_NVARCHAR2: u32 = 2000;

/// Oracle adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleAdapter;

impl OracleAdapter {
    /// Creates a new Oracle adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectAdapter for OracleAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            alter_column: true,
            transactional_ddl: false,
        }
    }

    fn fold_identifier(&self, name: &str) -> String {
        name.to_uppercase()
    }

    fn type_name(&self, ty: &SemanticType) -> Option<String> {
        let name = match ty {
            SemanticType::Byte => "NUMBER(3)".to_string(),
            SemanticType::Boolean => "NUMBER(1)".to_string(),
            SemanticType::Short => "NUMBER(5)".to_string(),
            SemanticType::Integer => "NUMBER(10)".to_string(),
            SemanticType::Long => "NUMBER(19)".to_string(),
            SemanticType::Decimal { precision, scale } => format!("NUMBER({precision}, {scale})"),
            SemanticType::Float => "BINARY_FLOAT".to_string(),
            SemanticType::Double => "BINARY_DOUBLE".to_string(),
            SemanticType::DateTime => "TIMESTAMP".to_string(),
            SemanticType::Time => "INTERVAL DAY(0) TO SECOND(6)".to_string(),
            SemanticType::Uid => "RAW(16)".to_string(),
            SemanticType::Text(Some(n)) if *n <= MAX_NVARCHAR2 => format!("NVARCHAR2({n})"),
            SemanticType::Text(_) => "NCLOB".to_string(),
            SemanticType::Blob => "BLOB".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(name)
    }

    fn id_column(&self, name: &str, kind: IdKind) -> String {
        let name = self.quote_identifier(name);
        match kind {
            IdKind::AutoIncrement => {
                format!("{name} NUMBER(10) GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY")
            }
            IdKind::GeneratedUid => format!("{name} RAW(16) DEFAULT SYS_GUID() PRIMARY KEY"),
            IdKind::CallerString => format!("{name} NVARCHAR2(255) PRIMARY KEY"),
        }
    }

    fn auto_increment_column(
        &self,
        table: &TableDescriptor,
        column: &ColumnDescriptor,
    ) -> Result<String> {
        Ok(format!(
            "{} {} GENERATED BY DEFAULT AS IDENTITY NOT NULL",
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
            SemanticType::Time => "INTERVAL '0' SECOND".to_string(),
            SemanticType::Uid => "HEXTORAW('00000000000000000000000000000000')".to_string(),
            // '' is NULL in Oracle
            SemanticType::Text(_) => "N' '".to_string(),
            SemanticType::Blob => "EMPTY_BLOB()".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(literal)
    }

    fn prepare_session(&self, schema: &str, _create: bool) -> Vec<String> {
        vec![format!(
            "ALTER SESSION SET CURRENT_SCHEMA = {}",
            self.quote_identifier(schema)
        )]
    }

    fn add_column_sql(&self, table: &str, definition: &str) -> String {
        format!(
            "ALTER TABLE {} ADD ({definition})",
            self.quote_identifier(table)
        )
    }

    fn set_nullability(
        &self,
        table: &str,
        column: &str,
        _raw_type: &str,
        nullable: bool,
    ) -> Result<String> {
        let null = if nullable { "NULL" } else { "NOT NULL" };
        Ok(format!(
            "ALTER TABLE {} MODIFY ({} {null})",
            self.quote_identifier(table),
            self.quote_identifier(column)
        ))
    }

    fn drop_table(&self, table: &str) -> String {
        format!(
            "DROP TABLE {} CASCADE CONSTRAINTS",
            self.quote_identifier(table)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LiveColumnInfo;
    use crate::operation::Operation;

    #[test]
    fn test_type_names() {
        let ora = OracleAdapter::new();
        assert_eq!(ora.type_name(&SemanticType::Integer).unwrap(), "NUMBER(10)");
        assert_eq!(ora.type_name(&SemanticType::Text(Some(80))).unwrap(), "NVARCHAR2(80)");
        assert_eq!(ora.type_name(&SemanticType::Text(Some(4000))).unwrap(), "NCLOB");
        assert_eq!(ora.type_name(&SemanticType::Uid).unwrap(), "RAW(16)");
    }

    #[test]
    fn test_add_column_parenthesized() {
        let ora = OracleAdapter::new();
        let column = ColumnDescriptor::new("Note", SemanticType::Text(Some(40))).with_nullable(true);
        assert_eq!(
            ora.add_column("Order", &column).unwrap(),
            "ALTER TABLE \"Order\" ADD (\"Note\" NVARCHAR2(40))"
        );
    }

    #[test]
    fn test_compensations() {
        let ora = OracleAdapter::new();
        let column = ColumnDescriptor::new("Note", SemanticType::Text(Some(40))).with_nullable(true);
        let add = Operation::AddColumn {
            table: "Order".into(),
            column: column.clone(),
        };
        assert_eq!(
            ora.compensate(&add).unwrap(),
            vec!["ALTER TABLE \"Order\" DROP COLUMN \"Note\"".to_string()]
        );

        let loosen = Operation::DropNotNull {
            table: "Order".into(),
            column,
            live: LiveColumnInfo::new("Note", "NVARCHAR2(40)"),
        };
        assert_eq!(
            ora.render(&loosen).unwrap(),
            vec!["ALTER TABLE \"Order\" MODIFY (\"Note\" NULL)".to_string()]
        );
        assert_eq!(
            ora.compensate(&loosen).unwrap(),
            vec!["ALTER TABLE \"Order\" MODIFY (\"Note\" NOT NULL)".to_string()]
        );
    }

    #[test]
    fn test_drop_table_cascades_constraints() {
        assert_eq!(
            OracleAdapter::new().drop_table("Order"),
            "DROP TABLE \"Order\" CASCADE CONSTRAINTS"
        );
    }
}

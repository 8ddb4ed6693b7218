//! SQLite dialect.
//!
//! SQLite cannot alter columns or add constraints to an existing table, so
//! every structural change to a live table is planned as a rebuild.

use super::{Capabilities, Dialect, DialectAdapter, sql_literal};
use crate::entity::IdKind;
use crate::error::{Result, SyncError};
use crate::model::{ColumnDescriptor, KeyKind, TableDescriptor};
use crate::types::SemanticType;

/// SQLite adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteAdapter;

impl SqliteAdapter {
    /// Creates a new SQLite adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            alter_column: false,
            transactional_ddl: true,
        }
    }

    fn case_sensitive_identifiers(&self) -> bool {
        false
    }

    fn type_name(&self, ty: &SemanticType) -> Option<String> {
        // SQLite has storage classes, not types
        let name = match ty {
            SemanticType::Byte
            | SemanticType::Boolean
            | SemanticType::Short
            | SemanticType::Integer
            | SemanticType::Long => "INTEGER",
            SemanticType::Decimal { .. } => "NUMERIC",
            SemanticType::Float | SemanticType::Double => "REAL",
            SemanticType::DateTime
            | SemanticType::Time
            | SemanticType::Uid
            | SemanticType::Text(_) => "TEXT",
            SemanticType::Blob => "BLOB",
            SemanticType::Other(_) => return None,
        };
        Some(name.to_string())
    }

    fn id_column(&self, name: &str, kind: IdKind) -> String {
        let name = self.quote_identifier(name);
        match kind {
            IdKind::AutoIncrement => format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"),
            IdKind::GeneratedUid => {
                format!("{name} TEXT DEFAULT (lower(hex(randomblob(16)))) PRIMARY KEY")
            }
            IdKind::CallerString => format!("{name} TEXT PRIMARY KEY"),
        }
    }

    fn auto_increment_column(
        &self,
        table: &TableDescriptor,
        column: &ColumnDescriptor,
    ) -> Result<String> {
        let name = self.quote_identifier(&column.name);
        if self.inlines_open_key(table) {
            Ok(format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"))
        } else {
            // AUTOINCREMENT is only allowed on a single-column INTEGER PRIMARY KEY
            Ok(format!("{name} INTEGER NOT NULL"))
        }
    }

    fn inlines_open_key(&self, table: &TableDescriptor) -> bool {
        matches!(
            table.key,
            KeyKind::Open {
                auto_increment: true
            }
        ) && table.primary_key.len() == 1
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
            SemanticType::Text(_) => sql_literal(""),
            SemanticType::Blob => "X''".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(literal)
    }

    fn set_nullability(
        &self,
        table: &str,
        column: &str,
        _raw_type: &str,
        _nullable: bool,
    ) -> Result<String> {
        Err(SyncError::Unsupported {
            dialect: Dialect::Sqlite,
            operation: format!("altering column {table}.{column} in place"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ForeignKeyDescriptor, UniqueGroupDescriptor};
    use crate::operation::{CopyColumn, CopySource};

    fn order_table() -> TableDescriptor {
        let mut id = ColumnDescriptor::new("Id", SemanticType::Integer);
        id.primary_key = true;
        id.auto_generated = true;
        TableDescriptor {
            name: "Order".into(),
            schema: None,
            columns: vec![
                id,
                ColumnDescriptor::new("CustomerId", SemanticType::Integer),
                ColumnDescriptor::new("Code", SemanticType::Text(Some(12))),
            ],
            foreign_keys: vec![ForeignKeyDescriptor {
                column: "CustomerId".into(),
                references_table: "Customer".into(),
                references_column: "Id".into(),
                nullable: false,
            }],
            unique_groups: vec![UniqueGroupDescriptor {
                id: "code".into(),
                columns: vec!["Code".into()],
            }],
            primary_key: vec!["Id".into()],
            key: KeyKind::Id(IdKind::AutoIncrement),
            soft_delete: false,
        }
    }

    #[test]
    fn test_create_table_inlines_constraints() {
        let sql = SqliteAdapter::new().create_table(&order_table(), true).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"Order\" (\n    \"Id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n    \"CustomerId\" INTEGER NOT NULL,\n    \"Code\" TEXT NOT NULL,\n    CONSTRAINT fk_Order_Customer FOREIGN KEY (\"CustomerId\") REFERENCES \"Customer\"(\"Id\") on delete cascade,\n    CONSTRAINT uq_Order_code UNIQUE (\"Code\")\n)"
        );
    }

    #[test]
    fn test_rebuild_sequence() {
        let copy = vec![
            CopyColumn {
                target: "Id".into(),
                source: CopySource::Column("Id".into()),
            },
            CopyColumn {
                target: "CustomerId".into(),
                source: CopySource::Column("CustomerId".into()),
            },
            CopyColumn {
                target: "Code".into(),
                source: CopySource::Coalesce("Code".into(), SemanticType::Text(Some(12))),
            },
        ];
        let statements = SqliteAdapter::new()
            .rebuild_table(&order_table(), "Order__shadow", &copy)
            .unwrap();

        assert_eq!(statements.len(), 4);
        assert_eq!(statements[0], "ALTER TABLE \"Order\" RENAME TO \"Order__shadow\"");
        assert!(statements[1].starts_with("CREATE TABLE \"Order\" ("));
        assert_eq!(
            statements[2],
            "INSERT INTO \"Order\" (\"Id\", \"CustomerId\", \"Code\") SELECT \"Id\", \"CustomerId\", COALESCE(\"Code\", '') FROM \"Order__shadow\""
        );
        assert_eq!(statements[3], "DROP TABLE \"Order__shadow\"");
    }

    #[test]
    fn test_alter_column_unsupported() {
        let err = SqliteAdapter::new()
            .set_nullability("Order", "Code", "TEXT", false)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unsupported);
    }

    #[test]
    fn test_single_auto_increment_open_key_inline() {
        let mut table = order_table();
        table.key = KeyKind::Open {
            auto_increment: true,
        };
        table.columns[0].name = "Seq".into();
        table.primary_key = vec!["Seq".into()];
        let sql = SqliteAdapter::new().create_table(&table, false).unwrap();
        assert!(sql.contains("\"Seq\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(!sql.contains("CONSTRAINT pk_Order"));
    }
}

//! PostgreSQL dialect.

use super::{Capabilities, Dialect, DialectAdapter, sql_literal};
use crate::entity::IdKind;
use crate::error::Result;
use crate::model::{ColumnDescriptor, TableDescriptor};
use crate::types::SemanticType;

/// PostgreSQL adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAdapter;

impl PostgresAdapter {
    /// Creates a new PostgreSQL adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            alter_column: true,
            transactional_ddl: true,
        }
    }

    fn max_identifier_length(&self) -> usize {
        63
    }

    fn fold_identifier(&self, name: &str) -> String {
        name.to_lowercase()
    }

    fn type_name(&self, ty: &SemanticType) -> Option<String> {
        let name = match ty {
            SemanticType::Byte | SemanticType::Short => "SMALLINT".to_string(),
            SemanticType::Boolean => "BOOLEAN".to_string(),
            SemanticType::Integer => "INTEGER".to_string(),
            SemanticType::Long => "BIGINT".to_string(),
            SemanticType::Decimal { precision, scale } => format!("NUMERIC({precision}, {scale})"),
            SemanticType::Float => "REAL".to_string(),
            SemanticType::Double => "DOUBLE PRECISION".to_string(),
            SemanticType::DateTime => "TIMESTAMP".to_string(),
            SemanticType::Time => "TIME".to_string(),
            SemanticType::Uid => "UUID".to_string(),
            SemanticType::Text(Some(n)) => format!("VARCHAR({n})"),
            SemanticType::Text(None) => "TEXT".to_string(),
            SemanticType::Blob => "BYTEA".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(name)
    }

    fn id_column(&self, name: &str, kind: IdKind) -> String {
        let name = self.quote_identifier(name);
        match kind {
            IdKind::AutoIncrement => format!("{name} SERIAL PRIMARY KEY"),
            IdKind::GeneratedUid => format!("{name} UUID DEFAULT gen_random_uuid() PRIMARY KEY"),
            IdKind::CallerString => format!("{name} VARCHAR(255) PRIMARY KEY"),
        }
    }

    fn auto_increment_column(
        &self,
        _table: &TableDescriptor,
        column: &ColumnDescriptor,
    ) -> Result<String> {
        // PostgreSQL uses SERIAL types instead of an identity keyword
        let serial = match column.ty {
            SemanticType::Byte | SemanticType::Short => "SMALLSERIAL",
            SemanticType::Long => "BIGSERIAL",
            _ => "SERIAL",
        };
        Ok(format!(
            "{} {serial} NOT NULL",
            self.quote_identifier(&column.name)
        ))
    }

    fn default_literal(&self, ty: &SemanticType) -> Option<String> {
        let literal = match ty {
            SemanticType::Byte
            | SemanticType::Short
            | SemanticType::Integer
            | SemanticType::Long
            | SemanticType::Decimal { .. }
            | SemanticType::Float
            | SemanticType::Double => "0".to_string(),
            SemanticType::Boolean => "FALSE".to_string(),
            SemanticType::DateTime => "CURRENT_TIMESTAMP".to_string(),
            SemanticType::Time => sql_literal("00:00:00"),
            SemanticType::Uid => sql_literal("00000000-0000-0000-0000-000000000000"),
            SemanticType::Text(_) => sql_literal(""),
            SemanticType::Blob => "'\\x'::bytea".to_string(),
            SemanticType::Other(_) => return None,
        };
        Some(literal)
    }

    fn prepare_session(&self, schema: &str, create: bool) -> Vec<String> {
        let schema = self.quote_identifier(schema);
        let mut statements = Vec::with_capacity(2);
        if create {
            statements.push(format!("CREATE SCHEMA IF NOT EXISTS {schema}"));
        }
        statements.push(format!("SET search_path TO {schema}"));
        statements
    }
}

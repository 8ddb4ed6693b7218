//! PostgreSQL catalog.

use oxide_sync_core::dialect::sql_literal;

use super::{CatalogQueries, SchemaIntrospector};

/// Reads `information_schema` of one PostgreSQL schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresIntrospector;

/// Key and unique columns of one constraint type.
fn key_columns(schema: &str, constraint_type: &str) -> String {
    format!(
        "SELECT tc.table_name::text, tc.constraint_name::text, kcu.column_name::text \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON kcu.constraint_schema = tc.constraint_schema \
          AND kcu.constraint_name = tc.constraint_name \
          AND kcu.table_name = tc.table_name \
         WHERE tc.table_schema = {schema} AND tc.constraint_type = '{constraint_type}' \
         ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position"
    )
}

impl SchemaIntrospector for PostgresIntrospector {
    fn queries(&self, schema: &str) -> CatalogQueries {
        let schema = sql_literal(schema);
        CatalogQueries {
            columns: format!(
                "SELECT c.table_name::text, c.column_name::text, c.data_type::text, \
                        c.is_nullable::text, c.column_default::text, \
                        CASE WHEN c.is_identity = 'YES' OR c.column_default LIKE 'nextval(%' \
                             THEN '1' ELSE '0' END \
                 FROM information_schema.columns c \
                 JOIN information_schema.tables t \
                   ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
                 WHERE c.table_schema = {schema} AND t.table_type = 'BASE TABLE' \
                 ORDER BY c.table_name, c.ordinal_position"
            ),
            primary_keys: key_columns(&schema, "PRIMARY KEY"),
            foreign_keys: format!(
                "SELECT kcu.table_name::text, kcu.constraint_name::text, kcu.column_name::text, \
                        ref.table_name::text, ref.column_name::text, rc.delete_rule::text \
                 FROM information_schema.referential_constraints rc \
                 JOIN information_schema.key_column_usage kcu \
                   ON kcu.constraint_schema = rc.constraint_schema \
                  AND kcu.constraint_name = rc.constraint_name \
                 JOIN information_schema.key_column_usage ref \
                   ON ref.constraint_schema = rc.unique_constraint_schema \
                  AND ref.constraint_name = rc.unique_constraint_name \
                  AND ref.ordinal_position = kcu.position_in_unique_constraint \
                 WHERE rc.constraint_schema = {schema} \
                 ORDER BY kcu.table_name, kcu.constraint_name, kcu.ordinal_position"
            ),
            unique_constraints: key_columns(&schema, "UNIQUE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_a_literal() {
        let queries = PostgresIntrospector.queries("app's");
        assert!(queries.columns.contains("c.table_schema = 'app''s'"));
        assert!(queries.primary_keys.contains("'PRIMARY KEY'"));
        assert!(queries.unique_constraints.contains("'UNIQUE'"));
    }
}

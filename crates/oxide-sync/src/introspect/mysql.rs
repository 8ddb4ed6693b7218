//! MySQL catalog.

use oxide_sync_core::dialect::sql_literal;

use super::{CatalogQueries, SchemaIntrospector};

/// Reads `information_schema` of one MySQL database.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlIntrospector;

fn key_columns(schema: &str, constraint_type: &str) -> String {
    format!(
        "SELECT tc.TABLE_NAME, tc.CONSTRAINT_NAME, kcu.COLUMN_NAME \
         FROM information_schema.TABLE_CONSTRAINTS tc \
         JOIN information_schema.KEY_COLUMN_USAGE kcu \
           ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA \
          AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
          AND kcu.TABLE_NAME = tc.TABLE_NAME \
         WHERE tc.TABLE_SCHEMA = {schema} AND tc.CONSTRAINT_TYPE = '{constraint_type}' \
         ORDER BY tc.TABLE_NAME, tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION"
    )
}

impl SchemaIntrospector for MySqlIntrospector {
    fn queries(&self, schema: &str) -> CatalogQueries {
        let schema = sql_literal(schema);
        CatalogQueries {
            // COLUMN_TYPE and COLUMN_DEFAULT are longtext/blob on some servers
            columns: format!(
                "SELECT c.TABLE_NAME, c.COLUMN_NAME, CAST(c.COLUMN_TYPE AS CHAR), c.IS_NULLABLE, \
                        CAST(c.COLUMN_DEFAULT AS CHAR), \
                        CASE WHEN c.EXTRA LIKE '%auto_increment%' THEN '1' ELSE '0' END \
                 FROM information_schema.COLUMNS c \
                 JOIN information_schema.TABLES t \
                   ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME \
                 WHERE c.TABLE_SCHEMA = {schema} AND t.TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION"
            ),
            primary_keys: key_columns(&schema, "PRIMARY KEY"),
            // the referenced key is named PRIMARY on every table, so the
            // referenced columns come from KEY_COLUMN_USAGE directly
            foreign_keys: format!(
                "SELECT kcu.TABLE_NAME, kcu.CONSTRAINT_NAME, kcu.COLUMN_NAME, \
                        kcu.REFERENCED_TABLE_NAME, kcu.REFERENCED_COLUMN_NAME, rc.DELETE_RULE \
                 FROM information_schema.KEY_COLUMN_USAGE kcu \
                 JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
                   ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA \
                  AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
                  AND rc.TABLE_NAME = kcu.TABLE_NAME \
                 WHERE kcu.TABLE_SCHEMA = {schema} AND kcu.REFERENCED_TABLE_NAME IS NOT NULL \
                 ORDER BY kcu.TABLE_NAME, kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION"
            ),
            unique_constraints: key_columns(&schema, "UNIQUE"),
        }
    }
}

//! SQL Server catalog.

use oxide_sync_core::dialect::sql_literal;

use super::{CatalogQueries, SchemaIntrospector};

/// Reads `INFORMATION_SCHEMA` of one SQL Server schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerIntrospector;

fn key_columns(schema: &str, constraint_type: &str) -> String {
    format!(
        "SELECT tc.TABLE_NAME, tc.CONSTRAINT_NAME, kcu.COLUMN_NAME \
         FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
         JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
           ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA \
          AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
          AND kcu.TABLE_NAME = tc.TABLE_NAME \
         WHERE tc.TABLE_SCHEMA = {schema} AND tc.CONSTRAINT_TYPE = '{constraint_type}' \
         ORDER BY tc.TABLE_NAME, tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION"
    )
}

impl SchemaIntrospector for SqlServerIntrospector {
    fn queries(&self, schema: &str) -> CatalogQueries {
        let schema = sql_literal(schema);
        CatalogQueries {
            // ALTER COLUMN restates the type, so lengths are part of it
            columns: format!(
                "SELECT c.TABLE_NAME, c.COLUMN_NAME, \
                        CASE \
                          WHEN c.CHARACTER_MAXIMUM_LENGTH = -1 THEN c.DATA_TYPE + '(MAX)' \
                          WHEN c.CHARACTER_MAXIMUM_LENGTH IS NOT NULL \
                            THEN c.DATA_TYPE + '(' + CAST(c.CHARACTER_MAXIMUM_LENGTH AS varchar(10)) + ')' \
                          WHEN c.DATA_TYPE IN ('decimal', 'numeric') \
                            THEN c.DATA_TYPE + '(' + CAST(c.NUMERIC_PRECISION AS varchar(10)) + ', ' \
                                 + CAST(c.NUMERIC_SCALE AS varchar(10)) + ')' \
                          ELSE c.DATA_TYPE \
                        END, \
                        c.IS_NULLABLE, c.COLUMN_DEFAULT, \
                        CAST(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)), \
                                            c.COLUMN_NAME, 'IsIdentity') AS varchar(1)) \
                 FROM INFORMATION_SCHEMA.COLUMNS c \
                 JOIN INFORMATION_SCHEMA.TABLES t \
                   ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME \
                 WHERE c.TABLE_SCHEMA = {schema} AND t.TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION"
            ),
            primary_keys: key_columns(&schema, "PRIMARY KEY"),
            foreign_keys: format!(
                "SELECT kcu.TABLE_NAME, kcu.CONSTRAINT_NAME, kcu.COLUMN_NAME, \
                        ref.TABLE_NAME, ref.COLUMN_NAME, rc.DELETE_RULE \
                 FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
                   ON kcu.CONSTRAINT_SCHEMA = rc.CONSTRAINT_SCHEMA \
                  AND kcu.CONSTRAINT_NAME = rc.CONSTRAINT_NAME \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE ref \
                   ON ref.CONSTRAINT_SCHEMA = rc.UNIQUE_CONSTRAINT_SCHEMA \
                  AND ref.CONSTRAINT_NAME = rc.UNIQUE_CONSTRAINT_NAME \
                  AND ref.ORDINAL_POSITION = kcu.ORDINAL_POSITION \
                 WHERE rc.CONSTRAINT_SCHEMA = {schema} \
                 ORDER BY kcu.TABLE_NAME, kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION"
            ),
            unique_constraints: key_columns(&schema, "UNIQUE"),
        }
    }
}

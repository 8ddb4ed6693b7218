//! Oracle catalog.

use oxide_sync_core::dialect::sql_literal;

use super::{CatalogQueries, SchemaIntrospector};

/// Reads the `ALL_*` dictionary views for one owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleIntrospector;

fn key_columns(owner: &str, constraint_type: char) -> String {
    format!(
        "SELECT c.TABLE_NAME, c.CONSTRAINT_NAME, cc.COLUMN_NAME \
         FROM ALL_CONSTRAINTS c \
         JOIN ALL_CONS_COLUMNS cc \
           ON cc.OWNER = c.OWNER AND cc.CONSTRAINT_NAME = c.CONSTRAINT_NAME \
         WHERE c.OWNER = {owner} AND c.CONSTRAINT_TYPE = '{constraint_type}' \
         ORDER BY c.TABLE_NAME, c.CONSTRAINT_NAME, cc.POSITION"
    )
}

impl SchemaIntrospector for OracleIntrospector {
    fn queries(&self, schema: &str) -> CatalogQueries {
        let owner = sql_literal(schema);
        CatalogQueries {
            // DATA_DEFAULT is a LONG and cannot be selected portably
            columns: format!(
                "SELECT c.TABLE_NAME, c.COLUMN_NAME, \
                        CASE \
                          WHEN c.DATA_TYPE IN ('NVARCHAR2', 'VARCHAR2', 'NCHAR', 'CHAR') \
                            THEN c.DATA_TYPE || '(' || c.CHAR_LENGTH || ')' \
                          WHEN c.DATA_TYPE = 'RAW' THEN 'RAW(' || c.DATA_LENGTH || ')' \
                          WHEN c.DATA_TYPE = 'NUMBER' AND c.DATA_PRECISION IS NOT NULL \
                            THEN 'NUMBER(' || c.DATA_PRECISION || ', ' || c.DATA_SCALE || ')' \
                          ELSE c.DATA_TYPE \
                        END, \
                        c.NULLABLE, NULL, c.IDENTITY_COLUMN \
                 FROM ALL_TAB_COLUMNS c \
                 JOIN ALL_TABLES t ON t.OWNER = c.OWNER AND t.TABLE_NAME = c.TABLE_NAME \
                 WHERE c.OWNER = {owner} \
                 ORDER BY c.TABLE_NAME, c.COLUMN_ID"
            ),
            primary_keys: key_columns(&owner, 'P'),
            foreign_keys: format!(
                "SELECT c.TABLE_NAME, c.CONSTRAINT_NAME, cc.COLUMN_NAME, \
                        r.TABLE_NAME, rc.COLUMN_NAME, c.DELETE_RULE \
                 FROM ALL_CONSTRAINTS c \
                 JOIN ALL_CONS_COLUMNS cc \
                   ON cc.OWNER = c.OWNER AND cc.CONSTRAINT_NAME = c.CONSTRAINT_NAME \
                 JOIN ALL_CONSTRAINTS r \
                   ON r.OWNER = c.R_OWNER AND r.CONSTRAINT_NAME = c.R_CONSTRAINT_NAME \
                 JOIN ALL_CONS_COLUMNS rc \
                   ON rc.OWNER = r.OWNER AND rc.CONSTRAINT_NAME = r.CONSTRAINT_NAME \
                  AND rc.POSITION = cc.POSITION \
                 WHERE c.OWNER = {owner} AND c.CONSTRAINT_TYPE = 'R' \
                 ORDER BY c.TABLE_NAME, c.CONSTRAINT_NAME, cc.POSITION"
            ),
            unique_constraints: key_columns(&owner, 'U'),
        }
    }
}

//! SQLite catalog.
//!
//! SQLite has no named primary keys and names foreign keys only when the DDL
//! does; foreign keys get `fk_<table>_<id>` and are matched by shape.

use super::{CatalogQueries, SchemaIntrospector};

/// Reads `sqlite_master` and the table pragmas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteIntrospector;

const TABLES: &str = "sqlite_master m";
const USER_TABLES: &str = "m.type = 'table' AND m.name NOT LIKE 'sqlite_%'";

impl SchemaIntrospector for SqliteIntrospector {
    fn queries(&self, _schema: &str) -> CatalogQueries {
        CatalogQueries {
            columns: format!(
                "SELECT m.name, p.name, p.type, \
                        CASE WHEN p.\"notnull\" = 0 AND p.pk = 0 THEN 'YES' ELSE 'NO' END, \
                        p.dflt_value, \
                        CASE WHEN p.pk = 1 AND upper(m.sql) LIKE '%AUTOINCREMENT%' \
                             THEN '1' ELSE '0' END \
                 FROM {TABLES} JOIN pragma_table_info(m.name) p \
                 WHERE {USER_TABLES} \
                 ORDER BY m.name, p.cid"
            ),
            primary_keys: format!(
                "SELECT m.name, NULL, p.name \
                 FROM {TABLES} JOIN pragma_table_info(m.name) p \
                 WHERE {USER_TABLES} AND p.pk > 0 \
                 ORDER BY m.name, p.pk"
            ),
            foreign_keys: format!(
                "SELECT m.name, 'fk_' || m.name || '_' || f.id, f.\"from\", f.\"table\", \
                        f.\"to\", f.on_delete \
                 FROM {TABLES} JOIN pragma_foreign_key_list(m.name) f \
                 WHERE {USER_TABLES} \
                 ORDER BY m.name, f.id, f.seq"
            ),
            unique_constraints: format!(
                "SELECT m.name, i.name, c.name \
                 FROM {TABLES} JOIN pragma_index_list(m.name) i \
                 JOIN pragma_index_info(i.name) c \
                 WHERE {USER_TABLES} AND i.origin = 'u' \
                 ORDER BY m.name, i.name, c.seqno"
            ),
        }
    }
}

//! Live schema introspection.
//!
//! Every dialect reads its catalog through four queries returning rows of a
//! fixed shape, all values as text:
//!
//! | query | columns |
//! |---|---|
//! | columns | table, column, type, nullable, default, auto-increment |
//! | primary keys | table, constraint, column (key order) |
//! | foreign keys | table, constraint, column, referenced table, referenced column, delete rule |
//! | unique constraints | table, constraint, column (key order) |
//!
//! The rows are then assembled into a [`LiveModel`] the same way for every
//! dialect.

mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use oxide_sync_core::dialect::Dialect;
use oxide_sync_core::error::{Result, SyncError};
use oxide_sync_core::model::{
    DeleteRule, LiveColumnInfo, LiveForeignKey, LiveModel, LiveTable, LiveUniqueConstraint,
    ID_COLUMN,
};
use tracing::debug;

pub use mssql::SqlServerIntrospector;
pub use mysql::MySqlIntrospector;
pub use oracle::OracleIntrospector;
pub use postgres::PostgresIntrospector;
pub use sqlite::SqliteIntrospector;

use crate::provider::{ExecutionProvider, Row};

/// Catalog queries of one dialect, bound to a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQueries {
    /// Column query.
    pub columns: String,
    /// Primary key query.
    pub primary_keys: String,
    /// Foreign key query.
    pub foreign_keys: String,
    /// Unique constraint query.
    pub unique_constraints: String,
}

/// Reads the live schema of one database.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Catalog queries for `schema`.
    fn queries(&self, schema: &str) -> CatalogQueries;

    /// Reads every table of `schema`, each catalog query bounded by
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::IntrospectionFailure`] with the failing or
    /// timed-out query.
    async fn read_schema(
        &self,
        provider: &mut dyn ExecutionProvider,
        schema: &str,
        timeout: Duration,
    ) -> Result<LiveModel> {
        let queries = self.queries(schema);
        let columns = fetch(provider, schema, &queries.columns, timeout).await?;
        let primary_keys = fetch(provider, schema, &queries.primary_keys, timeout).await?;
        let foreign_keys = fetch(provider, schema, &queries.foreign_keys, timeout).await?;
        let unique_constraints =
            fetch(provider, schema, &queries.unique_constraints, timeout).await?;
        let model = assemble(schema, &columns, &primary_keys, &foreign_keys, &unique_constraints);
        debug!(schema = %schema, tables = model.tables.len(), "Introspected schema");
        Ok(model)
    }
}

/// Returns the introspector for `dialect`.
#[must_use]
pub fn introspector(dialect: Dialect) -> Box<dyn SchemaIntrospector> {
    match dialect {
        Dialect::SqlServer => Box::new(SqlServerIntrospector),
        Dialect::MySql => Box::new(MySqlIntrospector),
        Dialect::Postgres => Box::new(PostgresIntrospector),
        Dialect::Sqlite => Box::new(SqliteIntrospector),
        Dialect::Oracle => Box::new(OracleIntrospector),
    }
}

async fn fetch(
    provider: &mut dyn ExecutionProvider,
    schema: &str,
    sql: &str,
    timeout: Duration,
) -> Result<Vec<Row>> {
    debug!(sql = %sql, "Querying catalog");
    let message = match tokio::time::timeout(timeout, provider.query(sql)).await {
        Ok(Ok(rows)) => return Ok(rows),
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {}s", timeout.as_secs_f64()),
    };
    Err(SyncError::IntrospectionFailure {
        schema: schema.to_string(),
        query: Some(sql.to_string()),
        message,
    })
}

fn text(row: &Row, index: usize) -> String {
    row.get(index).cloned().flatten().unwrap_or_default()
}

fn optional(row: &Row, index: usize) -> Option<String> {
    row.get(index).cloned().flatten().filter(|v| !v.is_empty())
}

fn flag(row: &Row, index: usize) -> bool {
    matches!(
        text(row, index).trim().to_ascii_uppercase().as_str(),
        "YES" | "Y" | "1" | "TRUE"
    )
}

/// Builds the live model out of catalog rows.
pub(crate) fn assemble(
    schema: &str,
    columns: &[Row],
    primary_keys: &[Row],
    foreign_keys: &[Row],
    unique_constraints: &[Row],
) -> LiveModel {
    let mut model = LiveModel::empty(schema);

    for row in columns {
        let table_name = text(row, 0);
        let table = model
            .tables
            .entry(table_name.clone())
            .or_insert_with(|| LiveTable {
                name: table_name,
                ..LiveTable::default()
            });
        let mut column = LiveColumnInfo::new(text(row, 1), text(row, 2));
        column.nullable = flag(row, 3);
        column.default = optional(row, 4);
        column.auto_increment = flag(row, 5);
        table.columns.push(column);
    }

    for row in primary_keys {
        let Some(table) = model.tables.get_mut(&text(row, 0)) else {
            continue;
        };
        let column_name = text(row, 2);
        if let Some(column) = table.columns.iter_mut().find(|c| c.name == column_name) {
            column.primary_key = true;
        }
        table.primary_key_constraint = optional(row, 1);
        table.primary_key.push(column_name);
    }

    // referenced columns may be implicit (SQLite), resolved against the key
    let mut positions: Vec<(String, String, usize)> = Vec::new();
    let mut resolved: Vec<(String, String, LiveForeignKey)> = Vec::new();
    for row in foreign_keys {
        let table_name = text(row, 0);
        let constraint = text(row, 1);
        let references_table = text(row, 3);
        let position = match positions
            .iter_mut()
            .find(|(t, c, _)| t == &table_name && c == &constraint)
        {
            Some((_, _, count)) => {
                *count += 1;
                *count - 1
            }
            None => {
                positions.push((table_name.clone(), constraint.clone(), 1));
                0
            }
        };
        let references_column = optional(row, 4).unwrap_or_else(|| {
            model
                .tables
                .get(&references_table)
                .and_then(|t| t.primary_key.get(position).cloned())
                .unwrap_or_else(|| ID_COLUMN.to_string())
        });
        resolved.push((
            table_name,
            text(row, 2),
            LiveForeignKey {
                constraint,
                references_table,
                references_column,
                delete_rule: DeleteRule::parse(&text(row, 5)),
            },
        ));
    }
    for (table_name, column_name, foreign_key) in resolved {
        if let Some(column) = model
            .tables
            .get_mut(&table_name)
            .and_then(|t| t.columns.iter_mut().find(|c| c.name == column_name))
        {
            column.foreign_key = Some(foreign_key);
        }
    }

    for row in unique_constraints {
        let Some(table) = model.tables.get_mut(&text(row, 0)) else {
            continue;
        };
        let name = text(row, 1);
        let column = text(row, 2);
        match table.unique_constraints.iter_mut().find(|u| u.name == name) {
            Some(unique) => unique.columns.push(column),
            None => table.unique_constraints.push(LiveUniqueConstraint {
                name,
                columns: vec![column],
            }),
        }
    }

    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::RecordingProvider;
    use oxide_sync_core::prelude::{
        EntityDescriptor, Property, SafetyGuard, SchemaDiffer, SemanticType, TargetSchemaExtractor,
    };

    fn row(values: &[Option<&str>]) -> Row {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn rows(values: &[&[Option<&str>]]) -> Vec<Row> {
        values.iter().map(|v| row(v)).collect()
    }

    fn shop() -> Vec<EntityDescriptor> {
        vec![
            EntityDescriptor::new("Customer")
                .property(Property::new("Name", SemanticType::Text(Some(80)))),
            EntityDescriptor::new("Event")
                .open_key(["Seq", "Tenant"], false)
                .property(Property::new("Seq", SemanticType::Long))
                .property(Property::new("Tenant", SemanticType::Text(Some(20)))),
            EntityDescriptor::new("Order")
                .property(
                    Property::new("CustomerId", SemanticType::Integer).references("Customer", "Id"),
                )
                .property(Property::new("Code", SemanticType::Text(Some(12))).unique("code"))
                .with_activation(),
        ]
    }

    /// Plans `shop()` against catalog rows and expects nothing to do.
    fn assert_catalog_up_to_date(
        dialect: Dialect,
        columns: &[Row],
        primary_keys: &[Row],
        foreign_keys: &[Row],
        uniques: &[Row],
    ) {
        let schema = dialect.default_schema().unwrap_or("APP");
        let live = assemble(schema, columns, primary_keys, foreign_keys, uniques);
        let adapter = dialect.adapter();
        let target = TargetSchemaExtractor::new(adapter.as_ref())
            .extract(&shop(), dialect.default_schema())
            .unwrap();
        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
            .plan(&target, &live)
            .unwrap();
        let operations: Vec<String> = plan.iter().map(|(_, op)| op.to_string()).collect();
        assert!(operations.is_empty(), "{dialect}: {operations:?}");
    }

    #[test]
    fn test_postgres_catalog_is_up_to_date() {
        let serial = Some("nextval('\"Customer_Id_seq\"'::regclass)");
        let columns = rows(&[
            &[Some("Customer"), Some("Id"), Some("integer"), Some("NO"), serial, Some("1")],
            &[Some("Customer"), Some("Name"), Some("character varying"), Some("NO"), None, Some("0")],
            &[Some("Event"), Some("Seq"), Some("bigint"), Some("NO"), None, Some("0")],
            &[Some("Event"), Some("Tenant"), Some("character varying"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Id"), Some("integer"), Some("NO"), Some("nextval('\"Order_Id_seq\"'::regclass)"), Some("1")],
            &[Some("Order"), Some("CustomerId"), Some("integer"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Code"), Some("character varying"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Inactive"), Some("boolean"), Some("NO"), Some("false"), Some("0")],
        ]);
        let primary_keys = rows(&[
            &[Some("Customer"), Some("Customer_pkey"), Some("Id")],
            &[Some("Event"), Some("pk_event"), Some("Seq")],
            &[Some("Event"), Some("pk_event"), Some("Tenant")],
            &[Some("Order"), Some("Order_pkey"), Some("Id")],
        ]);
        let foreign_keys = rows(&[&[
            Some("Order"),
            Some("fk_order_customer"),
            Some("CustomerId"),
            Some("Customer"),
            Some("Id"),
            Some("CASCADE"),
        ]]);
        let uniques = rows(&[&[Some("Order"), Some("uq_order_code"), Some("Code")]]);
        assert_catalog_up_to_date(Dialect::Postgres, &columns, &primary_keys, &foreign_keys, &uniques);
    }

    #[test]
    fn test_mysql_catalog_is_up_to_date() {
        // lower_case_table_names=1 folds table names
        let columns = rows(&[
            &[Some("customer"), Some("Id"), Some("int"), Some("NO"), None, Some("1")],
            &[Some("customer"), Some("Name"), Some("varchar(80)"), Some("NO"), None, Some("0")],
            &[Some("event"), Some("Seq"), Some("bigint"), Some("NO"), None, Some("0")],
            &[Some("event"), Some("Tenant"), Some("varchar(20)"), Some("NO"), None, Some("0")],
            &[Some("order"), Some("Id"), Some("int"), Some("NO"), None, Some("1")],
            &[Some("order"), Some("CustomerId"), Some("int"), Some("NO"), None, Some("0")],
            &[Some("order"), Some("Code"), Some("varchar(12)"), Some("NO"), None, Some("0")],
            &[Some("order"), Some("Inactive"), Some("tinyint(1)"), Some("NO"), Some("0"), Some("0")],
        ]);
        let primary_keys = rows(&[
            &[Some("customer"), Some("PRIMARY"), Some("Id")],
            &[Some("event"), Some("PRIMARY"), Some("Seq")],
            &[Some("event"), Some("PRIMARY"), Some("Tenant")],
            &[Some("order"), Some("PRIMARY"), Some("Id")],
        ]);
        let foreign_keys = rows(&[&[
            Some("order"),
            Some("fk_Order_Customer"),
            Some("CustomerId"),
            Some("customer"),
            Some("Id"),
            Some("CASCADE"),
        ]]);
        let uniques = rows(&[&[Some("order"), Some("uq_Order_code"), Some("Code")]]);
        assert_catalog_up_to_date(Dialect::MySql, &columns, &primary_keys, &foreign_keys, &uniques);
    }

    #[test]
    fn test_sql_server_catalog_is_up_to_date() {
        let columns = rows(&[
            &[Some("Customer"), Some("Id"), Some("int"), Some("NO"), None, Some("1")],
            &[Some("Customer"), Some("Name"), Some("nvarchar(80)"), Some("NO"), None, Some("0")],
            &[Some("Event"), Some("Seq"), Some("bigint"), Some("NO"), None, Some("0")],
            &[Some("Event"), Some("Tenant"), Some("nvarchar(20)"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Id"), Some("int"), Some("NO"), None, Some("1")],
            &[Some("Order"), Some("CustomerId"), Some("int"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Code"), Some("nvarchar(12)"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Inactive"), Some("bit"), Some("NO"), Some("((0))"), Some("0")],
        ]);
        let primary_keys = rows(&[
            &[Some("Customer"), Some("PK__Customer__3214EC07A1B2C3D4"), Some("Id")],
            &[Some("Event"), Some("pk_Event"), Some("Seq")],
            &[Some("Event"), Some("pk_Event"), Some("Tenant")],
            &[Some("Order"), Some("PK__Order__3214EC0795E1F2A7"), Some("Id")],
        ]);
        let foreign_keys = rows(&[&[
            Some("Order"),
            Some("fk_Order_Customer"),
            Some("CustomerId"),
            Some("Customer"),
            Some("Id"),
            Some("CASCADE"),
        ]]);
        let uniques = rows(&[&[Some("Order"), Some("uq_Order_code"), Some("Code")]]);
        assert_catalog_up_to_date(
            Dialect::SqlServer,
            &columns,
            &primary_keys,
            &foreign_keys,
            &uniques,
        );
    }

    #[test]
    fn test_oracle_catalog_is_up_to_date() {
        let columns = rows(&[
            &[Some("Customer"), Some("Id"), Some("NUMBER(10, 0)"), Some("N"), None, Some("YES")],
            &[Some("Customer"), Some("Name"), Some("NVARCHAR2(80)"), Some("N"), None, Some("NO")],
            &[Some("Event"), Some("Seq"), Some("NUMBER(19, 0)"), Some("N"), None, Some("NO")],
            &[Some("Event"), Some("Tenant"), Some("NVARCHAR2(20)"), Some("N"), None, Some("NO")],
            &[Some("Order"), Some("Id"), Some("NUMBER(10, 0)"), Some("N"), None, Some("YES")],
            &[Some("Order"), Some("CustomerId"), Some("NUMBER(10, 0)"), Some("N"), None, Some("NO")],
            &[Some("Order"), Some("Code"), Some("NVARCHAR2(12)"), Some("N"), None, Some("NO")],
            &[Some("Order"), Some("Inactive"), Some("NUMBER(1, 0)"), Some("N"), None, Some("NO")],
        ]);
        let primary_keys = rows(&[
            &[Some("Customer"), Some("SYS_C008101"), Some("Id")],
            &[Some("Event"), Some("PK_EVENT"), Some("Seq")],
            &[Some("Event"), Some("PK_EVENT"), Some("Tenant")],
            &[Some("Order"), Some("SYS_C008105"), Some("Id")],
        ]);
        let foreign_keys = rows(&[&[
            Some("Order"),
            Some("FK_ORDER_CUSTOMER"),
            Some("CustomerId"),
            Some("Customer"),
            Some("Id"),
            Some("CASCADE"),
        ]]);
        let uniques = rows(&[&[Some("Order"), Some("UQ_ORDER_CODE"), Some("Code")]]);
        assert_catalog_up_to_date(Dialect::Oracle, &columns, &primary_keys, &foreign_keys, &uniques);
    }

    #[test]
    fn test_sqlite_catalog_is_up_to_date() {
        let columns = rows(&[
            &[Some("Customer"), Some("Id"), Some("INTEGER"), Some("NO"), None, Some("1")],
            &[Some("Customer"), Some("Name"), Some("TEXT"), Some("NO"), None, Some("0")],
            &[Some("Event"), Some("Seq"), Some("INTEGER"), Some("NO"), None, Some("0")],
            &[Some("Event"), Some("Tenant"), Some("TEXT"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Id"), Some("INTEGER"), Some("NO"), None, Some("1")],
            &[Some("Order"), Some("CustomerId"), Some("INTEGER"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Code"), Some("TEXT"), Some("NO"), None, Some("0")],
            &[Some("Order"), Some("Inactive"), Some("INTEGER"), Some("NO"), Some("0"), Some("0")],
        ]);
        let primary_keys = rows(&[
            &[Some("Customer"), None, Some("Id")],
            &[Some("Event"), None, Some("Seq")],
            &[Some("Event"), None, Some("Tenant")],
            &[Some("Order"), None, Some("Id")],
        ]);
        let foreign_keys = rows(&[&[
            Some("Order"),
            Some("fk_Order_0"),
            Some("CustomerId"),
            Some("Customer"),
            None,
            Some("CASCADE"),
        ]]);
        let uniques = rows(&[&[Some("Order"), Some("sqlite_autoindex_Order_1"), Some("Code")]]);
        assert_catalog_up_to_date(Dialect::Sqlite, &columns, &primary_keys, &foreign_keys, &uniques);
    }

    #[test]
    fn test_assemble_tables() {
        let columns = vec![
            row(&[Some("Customer"), Some("Id"), Some("integer"), Some("NO"), None, Some("1")]),
            row(&[Some("Order"), Some("Id"), Some("integer"), Some("NO"), None, Some("1")]),
            row(&[Some("Order"), Some("CustomerId"), Some("integer"), Some("YES"), None, Some("0")]),
            row(&[Some("Order"), Some("Code"), Some("text"), Some("NO"), Some("''"), Some("0")]),
        ];
        let primary_keys = vec![
            row(&[Some("Customer"), Some("pk_Customer"), Some("Id")]),
            row(&[Some("Order"), Some("pk_Order"), Some("Id")]),
        ];
        let foreign_keys = vec![row(&[
            Some("Order"),
            Some("fk_Order_Customer"),
            Some("CustomerId"),
            Some("Customer"),
            Some("Id"),
            Some("SET NULL"),
        ])];
        let uniques = vec![row(&[Some("Order"), Some("uq_Order_code"), Some("Code")])];

        let model = assemble("public", &columns, &primary_keys, &foreign_keys, &uniques);
        let order = model.tables.get("Order").unwrap();

        assert_eq!(model.tables.len(), 2);
        assert_eq!(order.primary_key, vec!["Id"]);
        assert_eq!(order.primary_key_constraint.as_deref(), Some("pk_Order"));
        assert!(order.columns[0].primary_key);
        assert!(order.columns[0].auto_increment);
        assert!(order.columns[1].nullable);
        assert_eq!(order.columns[2].default.as_deref(), Some("''"));
        let fk = order.columns[1].foreign_key.as_ref().unwrap();
        assert_eq!(fk.delete_rule, DeleteRule::SetNull);
        assert_eq!(order.unique_constraints[0].columns, vec!["Code"]);
    }

    #[test]
    fn test_implicit_referenced_column_resolves_to_key() {
        let columns = vec![
            row(&[Some("Account"), Some("Number"), Some("TEXT"), Some("0"), None, Some("0")]),
            row(&[Some("Transfer"), Some("Source"), Some("TEXT"), Some("0"), None, Some("0")]),
        ];
        let primary_keys = vec![row(&[Some("Account"), None, Some("Number")])];
        let foreign_keys = vec![row(&[
            Some("Transfer"),
            Some("fk_Transfer_0"),
            Some("Source"),
            Some("Account"),
            None,
            Some("CASCADE"),
        ])];

        let model = assemble("main", &columns, &primary_keys, &foreign_keys, &[]);
        let transfer = model.tables.get("Transfer").unwrap();
        let fk = transfer.columns[0].foreign_key.as_ref().unwrap();
        assert_eq!(fk.references_column, "Number");
        assert!(model.tables.get("Account").unwrap().primary_key_constraint.is_none());
    }

    #[tokio::test]
    async fn test_query_failure_is_introspection_failure() {
        let mut provider = RecordingProvider::failing_on("information_schema.columns");
        let err = PostgresIntrospector
            .read_schema(&mut provider, "public", Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            SyncError::IntrospectionFailure { schema, query, .. } => {
                assert_eq!(schema, "public");
                assert!(query.unwrap().contains("information_schema.columns"));
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[tokio::test]
    async fn test_each_catalog_query_is_bounded() {
        let mut provider = RecordingProvider {
            stall_on: vec!["'PRIMARY KEY'".to_string()],
            ..RecordingProvider::default()
        };
        let err = PostgresIntrospector
            .read_schema(&mut provider, "public", Duration::from_millis(20))
            .await
            .unwrap_err();
        match err {
            SyncError::IntrospectionFailure { query, message, .. } => {
                assert!(query.unwrap().contains("'PRIMARY KEY'"));
                assert!(message.starts_with("timed out"));
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(provider.executed.len(), 1);
        assert!(provider.executed[0].contains("information_schema.columns"));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_empty_model() {
        let mut provider = RecordingProvider::default();
        let model = MySqlIntrospector
            .read_schema(&mut provider, "shop", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(model.tables.is_empty());
        assert_eq!(provider.executed.len(), 4);
    }
}

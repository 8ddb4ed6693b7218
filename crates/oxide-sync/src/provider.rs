//! Execution providers.
//!
//! A provider runs literal SQL on one connection. The engine never holds
//! more than one connection per database and never issues statements
//! concurrently on it.

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Connection, Row as _};
use tracing::debug;

/// One result row, every value rendered as text.
pub type Row = Vec<Option<String>>;

/// Errors raised by a provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Database driver error.
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    /// Error reported by a caller-supplied provider.
    #[error("{0}")]
    Other(String),
}

/// Runs SQL on a single connection.
#[async_trait]
pub trait ExecutionProvider: Send {
    /// Runs a query and returns its rows.
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, ProviderError>;

    /// Runs a statement and returns the number of affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64, ProviderError>;

    /// Runs a query and returns the first column of its first row.
    async fn execute_scalar(&mut self, sql: &str) -> Result<Option<String>, ProviderError> {
        let rows = self.query(sql).await?;
        Ok(rows.into_iter().next().and_then(|row| row.into_iter().next().flatten()))
    }
}

/// Provider over a sqlx [`AnyConnection`], for PostgreSQL, MySQL and SQLite.
pub struct SqlxProvider {
    conn: AnyConnection,
}

impl SqlxProvider {
    /// Connects to `url`.
    ///
    /// # Errors
    ///
    /// Fails when the URL scheme has no installed driver or the connection
    /// cannot be established.
    pub async fn connect(url: &str) -> Result<Self, ProviderError> {
        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(url).await?;
        debug!(backend = conn.backend_name(), "Connected");
        Ok(Self { conn })
    }

    /// Wraps an open connection.
    #[must_use]
    pub fn new(conn: AnyConnection) -> Self {
        Self { conn }
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Fails when the driver reports an error on close.
    pub async fn close(self) -> Result<(), ProviderError> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Reads a column as text whatever its storage type.
fn text_value(row: &AnyRow, index: usize) -> Result<Option<String>, sqlx::Error> {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return Ok(value);
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(value.map(|v| v.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return Ok(value.map(|v| v.to_string()));
    }
    row.try_get::<Option<bool>, _>(index)
        .map(|value| value.map(|v| if v { "1".to_string() } else { "0".to_string() }))
}

#[async_trait]
impl ExecutionProvider for SqlxProvider {
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, ProviderError> {
        let rows = sqlx::query(sql).fetch_all(&mut self.conn).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let values = (0..row.len())
                .map(|i| text_value(row, i))
                .collect::<Result<Row, _>>()?;
            out.push(values);
        }
        Ok(out)
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, ProviderError> {
        let conn: &mut AnyConnection = &mut self.conn;
        let result = sqlx::Executor::execute(conn, sqlx::raw_sql(sql)).await?;
        Ok(result.rows_affected())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    async fn memory() -> SqlxProvider {
        SqlxProvider::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_query_renders_values_as_text() {
        let mut provider = memory().await;
        provider
            .execute("CREATE TABLE t (a INTEGER, b TEXT, c REAL)")
            .await
            .unwrap();
        provider
            .execute("INSERT INTO t VALUES (7, 'x', 1.5), (NULL, NULL, NULL)")
            .await
            .unwrap();

        let rows = provider.query("SELECT a, b, c FROM t ORDER BY a DESC").await.unwrap();
        assert_eq!(
            rows[0],
            vec![Some("7".to_string()), Some("x".to_string()), Some("1.5".to_string())]
        );
        assert_eq!(rows[1], vec![None, None, None]);
    }

    #[tokio::test]
    async fn test_execute_scalar() {
        let mut provider = memory().await;
        assert_eq!(
            provider.execute_scalar("SELECT 'main'").await.unwrap(),
            Some("main".to_string())
        );
        assert_eq!(
            provider
                .execute_scalar("SELECT name FROM sqlite_master WHERE name = 'missing'")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_execute_reports_affected_rows() {
        let mut provider = memory().await;
        provider.execute("CREATE TABLE t (a INTEGER)").await.unwrap();
        let affected = provider
            .execute("INSERT INTO t VALUES (1), (2), (3)")
            .await
            .unwrap();
        assert_eq!(affected, 3);
    }
}

//! SQL export of executed statements.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use oxide_sync_core::dialect::Dialect;
use oxide_sync_core::error::Result;
use tracing::info;

/// Writes executed statements to a timestamped `.sql` file.
#[derive(Debug, Clone)]
pub struct SqlExport {
    dir: PathBuf,
    dialect: Dialect,
}

impl SqlExport {
    /// Creates an export into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, dialect: Dialect) -> Self {
        Self {
            dir: dir.into(),
            dialect,
        }
    }

    /// File name for an export taken at `at`.
    #[must_use]
    pub fn file_name(dialect: Dialect, at: DateTime<Local>) -> String {
        format!("oxide-sync_{}_{}.sql", dialect.name(), at.format("%Y%m%d_%H%M%S"))
    }

    /// Writes `statements` in order and returns the file path.
    ///
    /// # Errors
    ///
    /// Fails when the directory or file cannot be written.
    pub fn write(&self, statements: &[String]) -> Result<PathBuf> {
        let now = Local::now();
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::file_name(self.dialect, now));
        write_statements(&path, self.dialect, now, statements)?;
        info!(path = %path.display(), statements = statements.len(), "Exported SQL");
        Ok(path)
    }
}

fn write_statements(
    path: &Path,
    dialect: Dialect,
    at: DateTime<Local>,
    statements: &[String],
) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "-- oxide-sync {dialect} {}", at.to_rfc3339())?;
    for statement in statements {
        writeln!(out, "{statement};")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            SqlExport::file_name(Dialect::Postgres, at),
            format!("oxide-sync_{}_20240309_140507.sql", Dialect::Postgres.name())
        );
    }

    #[test]
    fn test_write_statements_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let export = SqlExport::new(dir.path().join("exports"), Dialect::Sqlite);

        let path = export
            .write(&["BEGIN".to_string(), "CREATE TABLE \"t\" (\"Id\" INTEGER)".to_string()])
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("-- oxide-sync"));
        assert_eq!(lines[1], "BEGIN;");
        assert_eq!(lines[2], "CREATE TABLE \"t\" (\"Id\" INTEGER);");
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("sql"));
    }
}

//! Applying a rendered script to a database.
//!
//! The strategy comes from the script: one transaction, one transaction with
//! SQLite foreign key enforcement suspended, or statement by statement with
//! compensation on failure.

use std::time::Duration;

use oxide_sync_core::dialect::DialectAdapter;
use oxide_sync_core::error::{FailureOutcome, Result, SyncError};
use oxide_sync_core::script::{Script, ScriptStatement, Strategy};
use tracing::{debug, error, info, warn};

use crate::provider::{ExecutionProvider, Row};

/// Run before the SQLite transaction. A rename to the shadow table must not
/// rewrite references held by other tables.
const SQLITE_ENTER: [&str; 2] = ["PRAGMA foreign_keys = OFF", "PRAGMA legacy_alter_table = ON"];

/// Run after the SQLite transaction, whatever its outcome.
const SQLITE_EXIT: [&str; 2] = ["PRAGMA legacy_alter_table = OFF", "PRAGMA foreign_keys = ON"];

const SQLITE_FOREIGN_KEY_CHECK: &str = "PRAGMA foreign_key_check";

/// Failed statement and the database message.
type StatementError = (String, String);

/// Applies scripts on one connection, one statement at a time.
pub struct ExecutionCoordinator<'a> {
    adapter: &'a dyn DialectAdapter,
    timeout: Duration,
    journal: Vec<String>,
}

impl<'a> ExecutionCoordinator<'a> {
    /// Creates a coordinator bounding every statement by `timeout`.
    #[must_use]
    pub const fn new(adapter: &'a dyn DialectAdapter, timeout: Duration) -> Self {
        Self {
            adapter,
            timeout,
            journal: Vec::new(),
        }
    }

    /// Statements that ran successfully, in order, including transaction
    /// control and session pragmas.
    #[must_use]
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    /// Applies `script` and returns the number of script statements run.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ExecutionFailure`] describing what happened to
    /// the statements already applied, or [`SyncError::CompensationFailure`]
    /// when undoing them failed too.
    pub async fn apply(
        &mut self,
        provider: &mut dyn ExecutionProvider,
        script: &Script,
    ) -> Result<usize> {
        if script.is_empty() {
            debug!("Nothing to apply");
            return Ok(0);
        }
        info!(
            dialect = %self.adapter.dialect(),
            strategy = ?script.strategy(),
            statements = script.len(),
            "Applying script"
        );
        match script.strategy() {
            Strategy::Transactional => self.in_transaction(provider, script, None).await,
            Strategy::SqliteForeignKeysOff => self.sqlite(provider, script).await,
            Strategy::Compensating => self.compensating(provider, script).await,
        }
    }

    async fn run(
        &mut self,
        provider: &mut dyn ExecutionProvider,
        sql: &str,
    ) -> std::result::Result<u64, StatementError> {
        debug!(sql = %sql, "Executing");
        match tokio::time::timeout(self.timeout, provider.execute(sql)).await {
            Ok(Ok(affected)) => {
                self.journal.push(sql.to_string());
                Ok(affected)
            }
            Ok(Err(e)) => Err((sql.to_string(), e.to_string())),
            Err(_) => Err((sql.to_string(), self.timed_out())),
        }
    }

    async fn query(
        &self,
        provider: &mut dyn ExecutionProvider,
        sql: &str,
    ) -> std::result::Result<Vec<Row>, StatementError> {
        debug!(sql = %sql, "Querying");
        match tokio::time::timeout(self.timeout, provider.query(sql)).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => Err((sql.to_string(), e.to_string())),
            Err(_) => Err((sql.to_string(), self.timed_out())),
        }
    }

    fn timed_out(&self) -> String {
        format!("timed out after {}s", self.timeout.as_secs_f64())
    }

    async fn run_all(
        &mut self,
        provider: &mut dyn ExecutionProvider,
        statements: &[ScriptStatement],
    ) -> std::result::Result<(), StatementError> {
        for statement in statements {
            self.run(provider, &statement.sql).await?;
        }
        Ok(())
    }

    /// Begin, every statement, optional integrity check, commit. Any
    /// failure after begin rolls back.
    async fn in_transaction(
        &mut self,
        provider: &mut dyn ExecutionProvider,
        script: &Script,
        integrity_check: Option<&str>,
    ) -> Result<usize> {
        let begin = self.adapter.begin_transaction();
        if let Err((statement, message)) = self.run(provider, begin).await {
            return Err(failure(statement, message, FailureOutcome::NotApplied));
        }

        let mut outcome = self.run_all(provider, script.statements()).await;
        if outcome.is_ok() {
            if let Some(check) = integrity_check {
                outcome = self.check_integrity(provider, check).await;
            }
        }
        if outcome.is_ok() {
            outcome = self
                .run(provider, self.adapter.commit_transaction())
                .await
                .map(|_| ());
        }

        match outcome {
            Ok(()) => {
                info!(statements = script.len(), "Script committed");
                Ok(script.len())
            }
            Err((statement, message)) => {
                error!(statement = %statement, error = %message, "Statement failed, rolling back");
                let rollback = self.adapter.rollback_transaction();
                if let Err((_, rollback_message)) = self.run(provider, rollback).await {
                    error!(error = %rollback_message, "Rollback failed");
                }
                Err(failure(statement, message, FailureOutcome::RolledBack))
            }
        }
    }

    async fn check_integrity(
        &self,
        provider: &mut dyn ExecutionProvider,
        check: &str,
    ) -> std::result::Result<(), StatementError> {
        let rows = self.query(provider, check).await?;
        match rows.first() {
            None => Ok(()),
            Some(first) => {
                let table = first.first().cloned().flatten().unwrap_or_default();
                Err((
                    check.to_string(),
                    format!(
                        "{} foreign key violation(s), first in table {table}",
                        rows.len()
                    ),
                ))
            }
        }
    }

    async fn sqlite(
        &mut self,
        provider: &mut dyn ExecutionProvider,
        script: &Script,
    ) -> Result<usize> {
        let mut entered = Ok(());
        for pragma in SQLITE_ENTER {
            if let Err(e) = self.run(provider, pragma).await {
                entered = Err(e);
                break;
            }
        }

        let result = match entered {
            Ok(()) => {
                self.in_transaction(provider, script, Some(SQLITE_FOREIGN_KEY_CHECK))
                    .await
            }
            Err((statement, message)) => {
                Err(failure(statement, message, FailureOutcome::NotApplied))
            }
        };

        for pragma in SQLITE_EXIT {
            if let Err((_, message)) = self.run(provider, pragma).await {
                warn!(pragma = %pragma, error = %message, "Could not restore session setting");
            }
        }
        result
    }

    async fn compensating(
        &mut self,
        provider: &mut dyn ExecutionProvider,
        script: &Script,
    ) -> Result<usize> {
        let mut applied: Vec<&ScriptStatement> = Vec::new();
        for statement in script.statements() {
            if let Err((sql, message)) = self.run(provider, &statement.sql).await {
                error!(statement = %sql, error = %message, "Statement failed, compensating");
                return Err(self.compensate(provider, sql, message, &applied).await);
            }
            applied.push(statement);
        }
        info!(statements = script.len(), "Script applied");
        Ok(script.len())
    }

    /// Undoes `applied`, newest first.
    async fn compensate(
        &mut self,
        provider: &mut dyn ExecutionProvider,
        statement: String,
        message: String,
        applied: &[&ScriptStatement],
    ) -> SyncError {
        let mut executed = 0;
        for reverted in applied.iter().rev() {
            for compensation in &reverted.revert {
                warn!(operation = %reverted.operation, sql = %compensation, "Compensating");
                if let Err((compensation, compensation_message)) =
                    self.run(provider, compensation).await
                {
                    error!(
                        compensation = %compensation,
                        error = %compensation_message,
                        "Compensation failed, schema needs manual repair"
                    );
                    return SyncError::CompensationFailure {
                        statement,
                        message,
                        compensation,
                        compensation_message,
                    };
                }
                executed += 1;
            }
        }

        let outcome = if applied.is_empty() {
            FailureOutcome::NotApplied
        } else {
            FailureOutcome::Compensated {
                statements: executed,
            }
        };
        failure(statement, message, outcome)
    }
}

const fn failure(statement: String, message: String, outcome: FailureOutcome) -> SyncError {
    SyncError::ExecutionFailure {
        statement,
        message,
        outcome,
    }
}

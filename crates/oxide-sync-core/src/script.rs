//! Rendering a plan into dialect SQL.

use serde::Serialize;

use crate::dialect::{Capabilities, DialectAdapter};
use crate::error::Result;
use crate::plan::{Batch, OperationPlan};

/// How a script is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One transaction around every statement.
    Transactional,
    /// One transaction with foreign key enforcement suspended around it,
    /// as SQLite table rebuilds require.
    SqliteForeignKeysOff,
    /// Statement by statement; applied statements are undone with their
    /// compensations, newest first, when a later one fails.
    Compensating,
}

impl Strategy {
    /// Picks the strategy a dialect supports.
    #[must_use]
    pub const fn for_capabilities(caps: Capabilities) -> Self {
        if !caps.transactional_ddl {
            Self::Compensating
        } else if !caps.alter_column {
            Self::SqliteForeignKeysOff
        } else {
            Self::Transactional
        }
    }
}

/// One SQL statement of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptStatement {
    /// Batch the statement belongs to.
    #[serde(skip)]
    pub batch: Batch,
    /// Operation the statement implements, for logs.
    pub operation: String,
    /// SQL text.
    pub sql: String,
    /// Statements undoing the whole operation once its last statement ran.
    /// Only computed for the compensating strategy.
    pub revert: Vec<String>,
    /// The operation needed authorization.
    pub destructive: bool,
}

/// The rendered statements of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    strategy: Strategy,
    statements: Vec<ScriptStatement>,
}

impl Script {
    /// Renders every operation of `plan` in execution order.
    ///
    /// # Errors
    ///
    /// Fails when the dialect cannot express an operation.
    pub fn render(plan: &OperationPlan, adapter: &dyn DialectAdapter) -> Result<Self> {
        let strategy = Strategy::for_capabilities(adapter.capabilities());
        let mut statements = Vec::with_capacity(plan.len());

        for (batch, op) in plan.iter() {
            let sql = adapter.render(op)?;
            let revert = if strategy == Strategy::Compensating {
                adapter.compensate(op)?
            } else {
                Vec::new()
            };
            let last = sql.len().saturating_sub(1);
            let operation = op.to_string();
            let destructive = op.is_destructive();
            let mut revert = Some(revert);
            for (i, sql) in sql.into_iter().enumerate() {
                statements.push(ScriptStatement {
                    batch,
                    operation: operation.clone(),
                    sql,
                    revert: if i == last {
                        revert.take().unwrap_or_default()
                    } else {
                        Vec::new()
                    },
                    destructive,
                });
            }
        }

        Ok(Self {
            strategy,
            statements,
        })
    }

    /// How the script must be applied.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Statements in execution order.
    #[must_use]
    pub fn statements(&self) -> &[ScriptStatement] {
        &self.statements
    }

    /// Returns `true` when there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// The script as one SQL text, each statement terminated by `;`.
    #[must_use]
    pub fn to_sql_text(&self) -> String {
        let mut text = String::new();
        for statement in &self.statements {
            text.push_str(&statement.sql);
            text.push_str(";\n");
        }
        text
    }
}

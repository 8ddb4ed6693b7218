//! Error types for schema synchronization.

use std::fmt;

use crate::dialect::Dialect;
use crate::guard::PolicyViolation;
use crate::types::SemanticType;

/// How far a failed execution got before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The transaction was rolled back; nothing was applied.
    RolledBack,
    /// Applied statements were reverted by running this many compensations.
    Compensated {
        /// Number of compensating statements executed.
        statements: usize,
    },
    /// Failed before anything was applied.
    NotApplied,
}

impl fmt::Display for FailureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RolledBack => f.write_str("transaction rolled back"),
            Self::Compensated { statements } => {
                write!(f, "{statements} compensating statement(s) executed")
            }
            Self::NotApplied => f.write_str("nothing applied"),
        }
    }
}

/// Error kind, for callers that branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Blocked by the safety policy.
    PolicyViolation,
    /// No type mapping.
    UnsupportedType,
    /// Malformed entity descriptor.
    InvalidEntity,
    /// Operation the dialect cannot express.
    Unsupported,
    /// The database rejected a statement.
    ExecutionFailure,
    /// Compensation failed; the schema needs manual repair.
    CompensationFailure,
    /// The catalog could not be read.
    IntrospectionFailure,
    /// Export file I/O.
    Io,
}

/// Errors raised by a synchronization run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A destructive or unsafe change was blocked.
    #[error("Policy violation: {0}")]
    PolicyViolation(#[from] PolicyViolation),

    /// A property type has no mapping in the dialect.
    #[error("Unsupported type '{ty}' for {entity}.{property} on {dialect}")]
    UnsupportedType {
        /// Entity (table) name.
        entity: String,
        /// Property (column) name.
        property: String,
        /// The unmapped type.
        ty: SemanticType,
        /// Dialect that lacks the mapping.
        dialect: Dialect,
    },

    /// An entity descriptor is malformed.
    #[error("Invalid entity '{entity}': {message}")]
    InvalidEntity {
        /// Entity name.
        entity: String,
        /// What is wrong.
        message: String,
    },

    /// The dialect cannot express an operation.
    #[error("{dialect} does not support {operation}")]
    Unsupported {
        /// Dialect.
        dialect: Dialect,
        /// Operation description.
        operation: String,
    },

    /// The database rejected a statement.
    #[error("Statement failed ({outcome}): {message}\n  statement: {statement}")]
    ExecutionFailure {
        /// The literal statement.
        statement: String,
        /// Database message.
        message: String,
        /// What happened to already-applied statements.
        outcome: FailureOutcome,
    },

    /// A compensating statement failed after a forward failure.
    #[error(
        "UNRECOVERABLE: compensation failed, schema is partially applied and needs manual repair\n  \
         failed statement: {statement}\n  error: {message}\n  \
         failed compensation: {compensation}\n  error: {compensation_message}"
    )]
    CompensationFailure {
        /// Forward statement that failed first.
        statement: String,
        /// Its database message.
        message: String,
        /// Compensating statement that then failed.
        compensation: String,
        /// Its database message.
        compensation_message: String,
    },

    /// The live catalog could not be read.
    #[error("Introspection of schema '{schema}' failed: {message}")]
    IntrospectionFailure {
        /// Schema being introspected.
        schema: String,
        /// Catalog query, when one was running.
        query: Option<String>,
        /// Error message.
        message: String,
    },

    /// IO error (export file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PolicyViolation(_) => ErrorKind::PolicyViolation,
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::InvalidEntity { .. } => ErrorKind::InvalidEntity,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::ExecutionFailure { .. } => ErrorKind::ExecutionFailure,
            Self::CompensationFailure { .. } => ErrorKind::CompensationFailure,
            Self::IntrospectionFailure { .. } => ErrorKind::IntrospectionFailure,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// The policy violation, if this is one.
    #[must_use]
    pub const fn as_policy_violation(&self) -> Option<&PolicyViolation> {
        match self {
            Self::PolicyViolation(violation) => Some(violation),
            _ => None,
        }
    }

    pub(crate) fn invalid_entity(entity: &str, message: impl Into<String>) -> Self {
        Self::InvalidEntity {
            entity: entity.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{DestructiveKind, ViolationKind};

    #[test]
    fn test_kind() {
        let err = SyncError::from(PolicyViolation {
            table: "Order".into(),
            columns: vec!["Note".into()],
            constraint: None,
            kind: ViolationKind::Destructive(DestructiveKind::ColumnDrop),
        });
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
        assert_eq!(err.as_policy_violation().unwrap().table, "Order");
    }

    #[test]
    fn test_execution_failure_names_statement() {
        let err = SyncError::ExecutionFailure {
            statement: "ALTER TABLE \"Order\" DROP COLUMN \"Note\"".into(),
            message: "column does not exist".into(),
            outcome: FailureOutcome::RolledBack,
        };
        let text = err.to_string();
        assert!(text.contains("rolled back"));
        assert!(text.contains("DROP COLUMN \"Note\""));
    }

    #[test]
    fn test_compensation_failure_is_loud() {
        let err = SyncError::CompensationFailure {
            statement: "a".into(),
            message: "b".into(),
            compensation: "c".into(),
            compensation_message: "d".into(),
        };
        assert!(err.to_string().starts_with("UNRECOVERABLE"));
        assert_eq!(err.kind(), ErrorKind::CompensationFailure);
    }
}

//! Per-run configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Command timeout applied when none is configured.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one synchronization run, read once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    /// Authorizes destructive column, constraint and key changes.
    pub developer_mode: bool,
    /// Authorizes every destructive change for this run only.
    pub force: bool,
    /// Bound on each statement.
    pub command_timeout: Duration,
    /// Schema / namespace; the dialect default when `None`.
    pub schema: Option<String>,
    /// Directory for the SQL export file; no export when `None`.
    pub export_dir: Option<PathBuf>,
}

impl Default for SyncContext {
    fn default() -> Self {
        Self {
            developer_mode: false,
            force: false,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            schema: None,
            export_dir: None,
        }
    }
}

impl SyncContext {
    /// Creates a context with every authorization off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets developer mode.
    #[must_use]
    pub const fn developer_mode(mut self, enabled: bool) -> Self {
        self.developer_mode = enabled;
        self
    }

    /// Sets the force flag.
    #[must_use]
    pub const fn force(mut self, enabled: bool) -> Self {
        self.force = enabled;
        self
    }

    /// Sets the command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Enables SQL export into `dir`.
    #[must_use]
    pub fn export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }
}

//! Synchronization runs: introspect, diff, render, execute.

use std::future::Future;
use std::path::PathBuf;

use futures::future::join_all;
use oxide_sync_core::context::SyncContext;
use oxide_sync_core::dialect::{Dialect, DialectAdapter};
use oxide_sync_core::diff::SchemaDiffer;
use oxide_sync_core::entity::EntityDescriptor;
use oxide_sync_core::error::{Result, SyncError};
use oxide_sync_core::extract::TargetSchemaExtractor;
use oxide_sync_core::guard::SafetyGuard;
use oxide_sync_core::model::{LiveModel, TargetModel};
use oxide_sync_core::plan::OperationPlan;
use oxide_sync_core::script::Script;
use tracing::{info, warn};

use crate::coordinator::ExecutionCoordinator;
use crate::export::SqlExport;
use crate::introspect::introspector;
use crate::provider::{ExecutionProvider, ProviderError};

/// Everything a run decided before executing anything.
#[derive(Debug)]
pub struct SyncPlan {
    /// Schema the run targets.
    pub schema: String,
    /// Declared schema.
    pub target: TargetModel,
    /// Schema found in the database.
    pub live: LiveModel,
    /// Ordered operations.
    pub plan: OperationPlan,
    /// Rendered statements.
    pub script: Script,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Dialect of the database.
    pub dialect: Dialect,
    /// Schema synchronized.
    pub schema: String,
    /// Script statements executed.
    pub statements_executed: usize,
    /// Authorized destructive operations, in execution order.
    pub destructive: Vec<String>,
    /// SQL export file, when exporting.
    pub export_path: Option<PathBuf>,
    /// Nothing needed to change.
    pub up_to_date: bool,
}

/// Synchronizes one database with a set of entities.
pub struct SchemaSync {
    dialect: Dialect,
    adapter: Box<dyn DialectAdapter>,
    context: SyncContext,
}

impl std::fmt::Debug for SchemaSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSync")
            .field("dialect", &self.dialect)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl SchemaSync {
    /// Creates a synchronizer for `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect, context: SyncContext) -> Self {
        Self {
            dialect,
            adapter: dialect.adapter(),
            context,
        }
    }

    /// The dialect.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The run context.
    #[must_use]
    pub const fn context(&self) -> &SyncContext {
        &self.context
    }

    /// The dialect adapter.
    #[must_use]
    pub fn adapter(&self) -> &dyn DialectAdapter {
        self.adapter.as_ref()
    }

    /// Schema of this run: configured, dialect default, or asked from the
    /// connection (MySQL database, Oracle user).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::IntrospectionFailure`] when the connection
    /// cannot tell.
    pub async fn resolve_schema(&self, provider: &mut dyn ExecutionProvider) -> Result<String> {
        if let Some(schema) = &self.context.schema {
            return Ok(schema.clone());
        }
        if let Some(schema) = self.dialect.default_schema() {
            return Ok(schema.to_string());
        }
        let sql = match self.dialect {
            Dialect::MySql => "SELECT DATABASE()",
            _ => "SELECT USER FROM DUAL",
        };
        let failure = |message: String| SyncError::IntrospectionFailure {
            schema: String::new(),
            query: Some(sql.to_string()),
            message,
        };
        match self.bounded(provider.execute_scalar(sql)).await {
            Ok(Some(schema)) if !schema.is_empty() => Ok(schema),
            Ok(_) => Err(failure("connection has no current schema".to_string())),
            Err(message) => Err(failure(message)),
        }
    }

    /// Introspects the database and plans the changes without executing.
    ///
    /// # Errors
    ///
    /// Fails on invalid entities, unauthorized destructive changes or
    /// introspection errors.
    pub async fn plan(
        &self,
        provider: &mut dyn ExecutionProvider,
        entities: &[EntityDescriptor],
    ) -> Result<SyncPlan> {
        self.plan_with(provider, entities, false).await
    }

    /// Plans against an empty database, without a connection.
    ///
    /// # Errors
    ///
    /// Fails on invalid entities or unmapped types.
    pub fn plan_offline(&self, entities: &[EntityDescriptor]) -> Result<SyncPlan> {
        let schema = self
            .context
            .schema
            .clone()
            .or_else(|| self.dialect.default_schema().map(str::to_string))
            .unwrap_or_default();
        let target = self.extract(entities, &schema)?;
        let live = LiveModel::empty(schema.clone());
        self.finish_plan(schema, target, live)
    }

    /// Brings the database in line with `entities`.
    ///
    /// # Errors
    ///
    /// Fails on policy violations before anything runs, and on execution
    /// failures after rollback or compensation.
    pub async fn update(
        &self,
        provider: &mut dyn ExecutionProvider,
        entities: &[EntityDescriptor],
    ) -> Result<RunReport> {
        info!(dialect = %self.dialect, entities = entities.len(), "Synchronizing schema");
        let plan = self.plan_with(provider, entities, true).await?;
        self.execute(provider, plan).await
    }

    /// Drops every entity table present in the database.
    ///
    /// # Errors
    ///
    /// Fails unless the run is forced.
    pub async fn drop_database(
        &self,
        provider: &mut dyn ExecutionProvider,
        entities: &[EntityDescriptor],
    ) -> Result<RunReport> {
        info!(dialect = %self.dialect, entities = entities.len(), "Dropping entity tables");
        let (schema, target, live) = self.introspect(provider, entities, false).await?;
        let plan = self.differ().plan_teardown(&target, &live)?;
        let script = Script::render(&plan, self.adapter())?;
        self.execute(
            provider,
            SyncPlan {
                schema,
                target,
                live,
                plan,
                script,
            },
        )
        .await
    }

    fn differ(&self) -> SchemaDiffer<'_> {
        SchemaDiffer::new(self.adapter(), SafetyGuard::from_context(&self.context))
    }

    async fn bounded<T>(
        &self,
        future: impl Future<Output = std::result::Result<T, ProviderError>>,
    ) -> std::result::Result<T, String> {
        match tokio::time::timeout(self.context.command_timeout, future).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!(
                "timed out after {}s",
                self.context.command_timeout.as_secs_f64()
            )),
        }
    }

    fn extract(&self, entities: &[EntityDescriptor], schema: &str) -> Result<TargetModel> {
        for entity in entities {
            if let Some(own) = &entity.schema {
                if !schema.is_empty() && !self.adapter.same_identifier(own, schema) {
                    return Err(SyncError::InvalidEntity {
                        entity: entity.table.clone(),
                        message: format!("declared in schema '{own}', the run targets '{schema}'"),
                    });
                }
            }
        }
        let default_schema = (!schema.is_empty()).then_some(schema);
        TargetSchemaExtractor::new(self.adapter()).extract(entities, default_schema)
    }

    async fn introspect(
        &self,
        provider: &mut dyn ExecutionProvider,
        entities: &[EntityDescriptor],
        create_schema: bool,
    ) -> Result<(String, TargetModel, LiveModel)> {
        let schema = self.resolve_schema(provider).await?;
        let target = self.extract(entities, &schema)?;

        for sql in self.adapter.prepare_session(&schema, create_schema) {
            self.bounded(provider.execute(&sql))
                .await
                .map_err(|message| SyncError::IntrospectionFailure {
                    schema: schema.clone(),
                    query: Some(sql.clone()),
                    message,
                })?;
        }

        let live = introspector(self.dialect)
            .read_schema(provider, &schema, self.context.command_timeout)
            .await?;
        Ok((schema, target, live))
    }

    async fn plan_with(
        &self,
        provider: &mut dyn ExecutionProvider,
        entities: &[EntityDescriptor],
        create_schema: bool,
    ) -> Result<SyncPlan> {
        let (schema, target, live) = self.introspect(provider, entities, create_schema).await?;
        self.finish_plan(schema, target, live)
    }

    fn finish_plan(&self, schema: String, target: TargetModel, live: LiveModel) -> Result<SyncPlan> {
        let plan = self.differ().plan(&target, &live)?;
        let script = Script::render(&plan, self.adapter())?;
        info!(
            schema = %schema,
            tables = target.tables.len(),
            operations = plan.len(),
            destructive = plan.destructive_count(),
            statements = script.len(),
            "Planned schema changes"
        );
        Ok(SyncPlan {
            schema,
            target,
            live,
            plan,
            script,
        })
    }

    async fn execute(
        &self,
        provider: &mut dyn ExecutionProvider,
        plan: SyncPlan,
    ) -> Result<RunReport> {
        let mut destructive: Vec<String> = Vec::new();
        for statement in plan.script.statements().iter().filter(|s| s.destructive) {
            warn!(operation = %statement.operation, sql = %statement.sql, "Destructive statement");
            if destructive.last() != Some(&statement.operation) {
                destructive.push(statement.operation.clone());
            }
        }

        let mut coordinator = ExecutionCoordinator::new(self.adapter(), self.context.command_timeout);
        let result = coordinator.apply(provider, &plan.script).await;

        let export_path = match self.export(coordinator.journal()) {
            Ok(path) => path,
            Err(e) if result.is_err() => {
                warn!(error = %e, "SQL export failed");
                None
            }
            Err(e) => return Err(e),
        };
        let statements_executed = result?;

        info!(
            dialect = %self.dialect,
            schema = %plan.schema,
            statements = statements_executed,
            "Schema synchronized"
        );
        Ok(RunReport {
            dialect: self.dialect,
            schema: plan.schema,
            statements_executed,
            destructive,
            export_path,
            up_to_date: plan.script.is_empty(),
        })
    }

    fn export(&self, journal: &[String]) -> Result<Option<PathBuf>> {
        match &self.context.export_dir {
            Some(dir) if !journal.is_empty() => {
                SqlExport::new(dir, self.dialect).write(journal).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// One database of a multi-database run.
pub struct SyncJob {
    /// Synchronizer for the database.
    pub sync: SchemaSync,
    /// Connection to it.
    pub provider: Box<dyn ExecutionProvider>,
    /// Entities it must hold.
    pub entities: Vec<EntityDescriptor>,
}

/// Updates independent databases concurrently, one connection each.
///
/// Results come back in job order; one failure does not stop the others.
pub async fn sync_databases(jobs: Vec<SyncJob>) -> Vec<Result<RunReport>> {
    join_all(jobs.into_iter().map(|mut job| async move {
        job.sync.update(job.provider.as_mut(), &job.entities).await
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::RecordingProvider;
    use oxide_sync_core::prelude::*;

    fn entities() -> Vec<EntityDescriptor> {
        vec![
            EntityDescriptor::new("Customer")
                .property(Property::new("Name", SemanticType::Text(Some(80)))),
            EntityDescriptor::new("Order").property(
                Property::new("CustomerId", SemanticType::Integer).references("Customer", "Id"),
            ),
        ]
    }

    #[tokio::test]
    async fn test_update_empty_database() {
        let sync = SchemaSync::new(Dialect::Postgres, SyncContext::new());
        let mut provider = RecordingProvider::default();

        let report = sync.update(&mut provider, &entities()).await.unwrap();

        assert_eq!(report.schema, "public");
        assert_eq!(report.statements_executed, 3);
        assert!(!report.up_to_date);
        assert!(report.destructive.is_empty());
        assert_eq!(provider.executed[0], "CREATE SCHEMA IF NOT EXISTS \"public\"");
        assert_eq!(provider.executed[1], "SET search_path TO \"public\"");
        assert_eq!(provider.executed.last().map(String::as_str), Some("COMMIT"));
    }

    #[tokio::test]
    async fn test_plan_does_not_create_schema() {
        let sync = SchemaSync::new(Dialect::Postgres, SyncContext::new().schema("sales"));
        let mut provider = RecordingProvider::default();

        let plan = sync.plan(&mut provider, &entities()).await.unwrap();

        assert_eq!(plan.schema, "sales");
        assert_eq!(plan.script.len(), 3);
        assert!(!provider.executed.iter().any(|s| s.starts_with("CREATE")));
    }

    #[tokio::test]
    async fn test_mysql_schema_asked_from_connection() {
        let sync = SchemaSync::new(Dialect::MySql, SyncContext::new());
        let mut provider = RecordingProvider::default();
        provider.results.insert(
            "SELECT DATABASE()".to_string(),
            vec![vec![Some("shop".to_string())]],
        );

        assert_eq!(sync.resolve_schema(&mut provider).await.unwrap(), "shop");
    }

    #[tokio::test]
    async fn test_missing_current_schema_is_introspection_failure() {
        let sync = SchemaSync::new(Dialect::Oracle, SyncContext::new());
        let mut provider = RecordingProvider::default();

        let err = sync.resolve_schema(&mut provider).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntrospectionFailure);
    }

    #[tokio::test]
    async fn test_entity_in_other_schema_rejected() {
        let sync = SchemaSync::new(Dialect::Postgres, SyncContext::new());
        let mut provider = RecordingProvider::default();
        let entities = vec![EntityDescriptor::new("Ledger").schema("finance")];

        let err = sync.plan(&mut provider, &entities).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEntity);
    }

    #[test]
    fn test_plan_offline_without_schema() {
        let sync = SchemaSync::new(Dialect::Oracle, SyncContext::new());
        let plan = sync.plan_offline(&entities()).unwrap();
        assert_eq!(plan.script.strategy(), Strategy::Compensating);
        assert_eq!(plan.script.len(), 3);
    }

    #[tokio::test]
    async fn test_export_written_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let sync = SchemaSync::new(
            Dialect::Postgres,
            SyncContext::new().export_dir(dir.path()),
        );
        let mut provider = RecordingProvider::default();

        let report = sync.update(&mut provider, &entities()).await.unwrap();

        let path = report.export_path.unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("CREATE TABLE \"Customer\""));
        assert!(text.contains("COMMIT;"));
    }

    #[tokio::test]
    async fn test_sync_databases_reports_each() {
        let jobs = vec![
            SyncJob {
                sync: SchemaSync::new(Dialect::Postgres, SyncContext::new()),
                provider: Box::new(RecordingProvider::default()),
                entities: entities(),
            },
            SyncJob {
                sync: SchemaSync::new(Dialect::Postgres, SyncContext::new()),
                provider: Box::new(RecordingProvider::failing_on("information_schema")),
                entities: entities(),
            },
        ];

        let results = sync_databases(jobs).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().statements_executed, 3);
        assert_eq!(
            results[1].as_ref().unwrap_err().kind(),
            ErrorKind::IntrospectionFailure
        );
    }
}

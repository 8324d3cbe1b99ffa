//! Migration engine implementation.

use std::path::PathBuf;
use std::time::Instant;

use strata_schema::Model;
use tracing::{debug, info};

use crate::decision::DecisionHandler;
use crate::error::{MigrateError, MigrateResult};
use crate::model_diff::diff_models;
use crate::options::DiffOptions;
use crate::protocol::{Formatter, Protocol};
use crate::source::{ModelSource, StatementExecutor};
use crate::sql::SqlStatement;
use crate::step::Step;

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Whether to write a raw SQL file alongside each artifact.
    pub write_sql: bool,
    /// Whether to run in dry-run mode.
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            write_sql: false,
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Write a raw SQL file alongside each artifact.
    pub fn write_sql(mut self, write_sql: bool) -> Self {
        self.write_sql = write_sql;
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// A planned migration: the steps to run and the model set they were
/// planned against.
#[derive(Debug)]
pub struct MigrationPlan {
    /// The ordered steps.
    pub protocol: Protocol,
    /// The models in effect when the plan was computed. Compilation
    /// targets this set so the plan stays valid even if definitions
    /// change afterwards.
    pub existing: Vec<Model>,
}

impl MigrationPlan {
    /// Check if there is anything to migrate.
    pub fn is_empty(&self) -> bool {
        self.protocol.is_empty()
    }

    /// Get a summary of the plan.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No changes to apply".to_string();
        }

        let mut created = 0usize;
        let mut dropped = 0usize;
        let mut renamed = 0usize;
        let mut other = 0usize;
        for step in self.protocol.steps() {
            match step {
                Step::CreateModel { .. } => created += 1,
                Step::DropModel { .. } => dropped += 1,
                Step::RenameModel { .. } => renamed += 1,
                _ => other += 1,
            }
        }

        let mut parts = Vec::new();
        if created > 0 {
            parts.push(format!("{created} models created"));
        }
        if dropped > 0 {
            parts.push(format!("{dropped} models dropped"));
        }
        if renamed > 0 {
            parts.push(format!("{renamed} models renamed"));
        }
        if other > 0 {
            parts.push(format!("{other} other steps"));
        }
        parts.join(", ")
    }

    /// Compile the plan to SQL statements.
    pub fn compile(&self) -> MigrateResult<Vec<SqlStatement>> {
        self.protocol.compile(&self.existing)
    }
}

/// Result of applying a plan.
#[derive(Debug)]
pub struct ApplyResult {
    /// Number of statements executed.
    pub executed: usize,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// The main migration engine.
pub struct MigrationEngine<D: DecisionHandler> {
    config: MigrationConfig,
    decisions: D,
    options: DiffOptions,
}

impl<D: DecisionHandler> MigrationEngine<D> {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, decisions: D) -> Self {
        Self {
            config,
            decisions,
            options: DiffOptions::new(),
        }
    }

    /// Create a new migration engine with diff options.
    pub fn with_options(config: MigrationConfig, decisions: D, options: DiffOptions) -> Self {
        Self {
            config,
            decisions,
            options,
        }
    }

    /// Get the diff options.
    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Plan a migration from the defined models to what the source
    /// currently holds.
    pub async fn plan(
        &self,
        defined: &[Model],
        source: &dyn ModelSource,
    ) -> MigrateResult<MigrationPlan> {
        let existing = source.get_models().await?;
        debug!(
            defined = defined.len(),
            existing = existing.len(),
            "diffing model sets"
        );

        let steps = diff_models(defined, &existing, &self.decisions, &self.options).await?;
        info!(steps = steps.len(), "migration planned");

        Ok(MigrationPlan {
            protocol: Protocol::from_steps(steps),
            existing,
        })
    }

    /// Persist the plan as a migration artifact. With `write_sql`
    /// enabled, a raw SQL file lands next to it.
    pub async fn create(
        &self,
        plan: &MigrationPlan,
        formatter: &dyn Formatter,
    ) -> MigrateResult<PathBuf> {
        if plan.is_empty() {
            return Err(MigrateError::other("no changes to persist"));
        }

        let path = plan
            .protocol
            .persist(&self.config.migrations_dir, formatter)
            .await?;

        if self.config.write_sql {
            let statements = plan.compile()?;
            let sql: Vec<String> = statements.into_iter().map(|s| s.statement).collect();
            let sql_path = path.with_extension("sql");
            tokio::fs::write(&sql_path, sql.join("\n")).await?;
            debug!(path = %sql_path.display(), "wrote SQL file");
        }

        info!(path = %path.display(), "created migration artifact");
        Ok(path)
    }

    /// Compile the plan and run it through the executor.
    pub async fn apply(
        &self,
        plan: &MigrationPlan,
        executor: &dyn StatementExecutor,
    ) -> MigrateResult<ApplyResult> {
        let start = Instant::now();
        let statements = plan.compile()?;

        if self.config.dry_run {
            for statement in &statements {
                info!(sql = %statement.statement, "[dry run] would execute");
            }
            return Ok(ApplyResult {
                executed: 0,
                duration_ms: start.elapsed().as_millis() as i64,
                dry_run: true,
            });
        }

        executor.execute(&statements).await?;
        let duration_ms = start.elapsed().as_millis() as i64;
        info!(
            statements = statements.len(),
            duration_ms, "migration applied"
        );

        Ok(ApplyResult {
            executed: statements.len(),
            duration_ms,
            dry_run: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::AutoDecision;
    use crate::protocol::PassthroughFormatter;
    use crate::source::StaticSource;
    use std::sync::Mutex;
    use strata_schema::{Field, FieldType};

    struct RecordingExecutor {
        executed: Mutex<Vec<String>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                executed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl StatementExecutor for RecordingExecutor {
        async fn execute(&self, statements: &[SqlStatement]) -> MigrateResult<()> {
            let mut executed = self.executed.lock().unwrap();
            for statement in statements {
                executed.push(statement.statement.clone());
            }
            Ok(())
        }
    }

    fn account() -> Model {
        Model::new("account").with_field(Field::new("email", FieldType::String))
    }

    #[test]
    fn test_config_builder() {
        let config = MigrationConfig::new()
            .migrations_dir("./custom")
            .write_sql(true)
            .dry_run(true);
        assert_eq!(config.migrations_dir, PathBuf::from("./custom"));
        assert!(config.write_sql);
        assert!(config.dry_run);
    }

    #[tokio::test]
    async fn test_plan_is_empty_when_in_sync() {
        let engine = MigrationEngine::new(MigrationConfig::new(), AutoDecision::new(true));
        let models = vec![account()];
        let plan = engine
            .plan(&models, &StaticSource::new(models.clone()))
            .await
            .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.summary(), "No changes to apply");
    }

    #[tokio::test]
    async fn test_plan_against_empty_source_creates_models() {
        let engine = MigrationEngine::new(MigrationConfig::new(), AutoDecision::new(true));
        let plan = engine
            .plan(&[account()], &StaticSource::empty())
            .await
            .unwrap();
        assert_eq!(plan.protocol.steps().len(), 1);
        assert_eq!(plan.summary(), "1 models created");
    }

    #[tokio::test]
    async fn test_create_persists_artifact_and_sql() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::new()
            .migrations_dir(dir.path())
            .write_sql(true);
        let engine = MigrationEngine::new(config, AutoDecision::new(true));

        let plan = engine
            .plan(&[account()], &StaticSource::empty())
            .await
            .unwrap();
        let path = engine.create(&plan, &PassthroughFormatter).await.unwrap();

        assert!(path.exists());
        let sql_path = path.with_extension("sql");
        assert!(sql_path.exists());
        let sql = std::fs::read_to_string(sql_path).unwrap();
        assert!(sql.contains("CREATE TABLE \"account\""));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MigrationEngine::new(
            MigrationConfig::new().migrations_dir(dir.path()),
            AutoDecision::new(true),
        );
        let models = vec![account()];
        let plan = engine
            .plan(&models, &StaticSource::new(models.clone()))
            .await
            .unwrap();
        assert!(engine.create(&plan, &PassthroughFormatter).await.is_err());
    }

    #[tokio::test]
    async fn test_apply_executes_statements() {
        let engine = MigrationEngine::new(MigrationConfig::new(), AutoDecision::new(true));
        let plan = engine
            .plan(&[account()], &StaticSource::empty())
            .await
            .unwrap();

        let executor = RecordingExecutor::new();
        let result = engine.apply(&plan, &executor).await.unwrap();
        assert!(!result.dry_run);
        assert_eq!(result.executed, 1);
        assert!(executor.executed.lock().unwrap()[0].contains("CREATE TABLE"));
    }

    struct FailingExecutor;

    #[async_trait::async_trait]
    impl StatementExecutor for FailingExecutor {
        async fn execute(&self, _statements: &[SqlStatement]) -> MigrateResult<()> {
            Err(MigrateError::execution("connection reset"))
        }
    }

    #[tokio::test]
    async fn test_executor_failure_propagates_unchanged() {
        let engine = MigrationEngine::new(MigrationConfig::new(), AutoDecision::new(true));
        let plan = engine
            .plan(&[account()], &StaticSource::empty())
            .await
            .unwrap();

        let err = engine.apply(&plan, &FailingExecutor).await.unwrap_err();
        assert!(matches!(err, MigrateError::Execution(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let engine = MigrationEngine::new(
            MigrationConfig::new().dry_run(true),
            AutoDecision::new(true),
        );
        let plan = engine
            .plan(&[account()], &StaticSource::empty())
            .await
            .unwrap();

        let executor = RecordingExecutor::new();
        let result = engine.apply(&plan, &executor).await.unwrap();
        assert!(result.dry_run);
        assert_eq!(result.executed, 0);
        assert!(executor.executed.lock().unwrap().is_empty());
    }
}

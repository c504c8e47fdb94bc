//! Migration engine implementation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use crate::author::{AuthoredMigration, MigrationAuthor, validate_name};
use crate::error::{MigrateResult, MigrationError};
use crate::file::{MigrationDirectory, MigrationFile, MigrationSet};
use crate::history::{LedgerConfig, MigrationLedger, MigrationRecord};
use crate::reset::{ResetConfig, clear_sql};
use crate::shadow::{ShadowDiff, ShadowProvisioner, ShadowWorkflow};
use crate::diff::SchemaDiffer;

/// Executes SQL text against one database.
#[async_trait::async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run `sql` as a single batch of statements.
    async fn execute_batch(&self, sql: &str) -> MigrateResult<()>;
}

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory of migration files.
    pub migrations_dir: PathBuf,
    /// Directory of declared schema files loaded into the shadow database.
    pub schema_dir: PathBuf,
    /// Directory of seed files applied after a reset.
    pub seeds_dir: PathBuf,
    /// Ledger location.
    pub ledger: LedgerConfig,
    /// What a reset clears and what it keeps.
    pub reset: ResetConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            schema_dir: PathBuf::from("./schema"),
            seeds_dir: PathBuf::from("./seeds"),
            ledger: LedgerConfig::default(),
            reset: ResetConfig::default(),
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

    /// Set the declared schema directory.
    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = dir.into();
        self
    }

    /// Set the seeds directory.
    pub fn seeds_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.seeds_dir = dir.into();
        self
    }

    /// Set the ledger location.
    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = ledger;
        self
    }

    /// Set the reset configuration.
    pub fn reset(mut self, reset: ResetConfig) -> Self {
        self.reset = reset;
        self
    }
}

/// Files applied by one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Filenames applied, in execution order.
    pub applied: Vec<String>,
    /// Whether the migrations directory was absent.
    pub directory_missing: bool,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
}

impl ApplyReport {
    /// Number of files applied in this invocation.
    pub fn count(&self) -> usize {
        self.applied.len()
    }

    /// Whether nothing needed applying.
    pub fn is_up_to_date(&self) -> bool {
        self.applied.is_empty()
    }

    /// One-line status.
    pub fn summary(&self) -> String {
        if self.is_up_to_date() {
            "Database up to date".to_string()
        } else {
            format!("Applied {} migrations", self.count())
        }
    }
}

/// Seed files applied after a reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Seed filenames applied, in order.
    pub applied: Vec<String>,
}

/// Files in `files` whose filename has no ledger record, in the order given.
pub fn pending<'a>(files: &'a [MigrationFile], applied: &[MigrationRecord]) -> Vec<&'a MigrationFile> {
    let applied: HashSet<&str> = applied.iter().map(|r| r.filename.as_str()).collect();
    files
        .iter()
        .filter(|f| !applied.contains(f.filename.as_str()))
        .collect()
}

/// Apply every file in `files` that has no record in `applied`.
///
/// Each file is executed and then recorded. The first failure stops the batch;
/// files applied before it stay recorded and the error reports how many there were.
pub async fn apply_new(
    executor: &dyn SqlExecutor,
    ledger: &dyn MigrationLedger,
    files: &[MigrationFile],
    applied: &[MigrationRecord],
) -> MigrateResult<ApplyReport> {
    run_in_order(executor, ledger, &pending(files, applied)).await
}

async fn run_in_order(
    executor: &dyn SqlExecutor,
    ledger: &dyn MigrationLedger,
    files: &[&MigrationFile],
) -> MigrateResult<ApplyReport> {
    let start = Instant::now();
    let mut report = ApplyReport::default();

    for file in files {
        let applied = report.applied.len();
        let sql = file
            .read()
            .await
            .map_err(|e| MigrationError::apply_failed(&file.filename, applied, e))?;

        info!(migration = %file.filename, "Applying migration");
        executor
            .execute_batch(&sql)
            .await
            .map_err(|e| MigrationError::apply_failed(&file.filename, applied, e))?;

        ledger
            .record_applied(&file.filename)
            .await
            .map_err(|e| MigrationError::apply_failed(&file.filename, applied, e))?;

        report.applied.push(file.filename.clone());
    }

    report.duration_ms = start.elapsed().as_millis() as i64;
    Ok(report)
}

/// Apply every file in `files` without consulting or writing the ledger.
pub async fn apply_seeds(executor: &dyn SqlExecutor, files: &[MigrationFile]) -> MigrateResult<SeedReport> {
    let mut report = SeedReport::default();
    for file in files {
        let sql = file.read().await?;
        info!(seed = %file.filename, "Applying seed");
        executor.execute_batch(&sql).await?;
        report.applied.push(file.filename.clone());
    }
    Ok(report)
}

/// Options for authoring a migration.
#[derive(Debug, Clone)]
pub struct AuthorOptions {
    /// Human readable name fragment; `autogen` when absent.
    pub name: Option<String>,
    /// Only surface the diff, never write or apply.
    pub dry_run: bool,
    /// Schema filter handed to the differ.
    pub schema: String,
}

impl Default for AuthorOptions {
    fn default() -> Self {
        Self {
            name: None,
            dry_run: false,
            schema: "public".to_string(),
        }
    }
}

/// Result of an authoring invocation.
#[derive(Debug)]
pub enum AuthorOutcome {
    /// Live and declared schemas match.
    NoChanges,
    /// Dry run: the diff that would have been written.
    Preview(String),
    /// A migration file was written and the apply engine ran.
    Written {
        /// The new file.
        migration: AuthoredMigration,
        /// What the follow-up apply did.
        applied: ApplyReport,
    },
}

/// Outcome of the best-effort seed step of a reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Seeds applied (possibly none).
    Applied(SeedReport),
    /// Seeds directory absent.
    Skipped,
    /// A seed failed; the reset still succeeded.
    Failed(String),
}

/// Result of a reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetReport {
    /// Migrations re-applied.
    pub migrations: ApplyReport,
    /// Seed step result.
    pub seeds: SeedOutcome,
}

impl ResetReport {
    /// One-line status.
    pub fn summary(&self) -> String {
        format!("Reset complete ({} migrations)", self.migrations.count())
    }
}

/// The main migration engine, bound to the live database.
pub struct MigrationEngine<L: MigrationLedger, E: SqlExecutor> {
    config: MigrationConfig,
    ledger: L,
    executor: E,
}

impl<L: MigrationLedger, E: SqlExecutor> MigrationEngine<L, E> {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, ledger: L, executor: E) -> Self {
        Self {
            config,
            ledger,
            executor,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The ledger in use.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Discover the migration files.
    pub async fn migrations(&self) -> MigrateResult<MigrationSet> {
        let set = MigrationDirectory::new(&self.config.migrations_dir)
            .discover()
            .await?;
        if let MigrationSet::Missing(dir) = &set {
            warn!(dir = %dir.display(), "Migrations directory not found; nothing to apply");
        }
        Ok(set)
    }

    /// Create the ledger if needed.
    pub async fn ensure_ledger(&self) -> MigrateResult<()> {
        self.ledger.ensure_ledger().await
    }

    /// Apply every migration without a ledger record.
    pub async fn apply(&self) -> MigrateResult<ApplyReport> {
        self.ledger.ensure_ledger().await?;
        let applied = self.ledger.list_applied().await?;
        let set = self.migrations().await?;
        let directory_missing = set.is_missing();

        let mut report = apply_new(&self.executor, &self.ledger, set.files(), &applied).await?;
        report.directory_missing = directory_missing;
        Ok(report)
    }

    /// Execute every migration file in order, recording each.
    ///
    /// Used after a reset has emptied the database; recording is idempotent,
    /// so files that already have a record keep their original one.
    pub async fn apply_all(&self) -> MigrateResult<ApplyReport> {
        let set = self.migrations().await?;
        let files: Vec<&MigrationFile> = set.files().iter().collect();
        let mut report = run_in_order(&self.executor, &self.ledger, &files).await?;
        report.directory_missing = set.is_missing();
        Ok(report)
    }

    /// Apply the seeds directory. An absent directory yields `None`.
    pub async fn seed(&self) -> MigrateResult<Option<SeedReport>> {
        match MigrationDirectory::new(&self.config.seeds_dir).discover().await? {
            MigrationSet::Missing(_) => Ok(None),
            MigrationSet::Found { files, .. } => apply_seeds(&self.executor, &files).await.map(Some),
        }
    }

    /// Drop every user-created object from the live database and empty the ledger.
    pub async fn clear(&self) -> MigrateResult<()> {
        info!(schema = %self.config.reset.working_schema, "Clearing database");
        self.executor
            .execute_batch(&clear_sql(&self.config.reset, &self.config.ledger))
            .await
    }

    /// Clear the database, rebuild the ledger, re-apply all migrations and seed.
    ///
    /// Seed failures are logged and reported in the result, never returned.
    pub async fn reset(&self) -> MigrateResult<ResetReport> {
        self.clear().await?;
        self.ledger.ensure_ledger().await?;
        let migrations = self.apply_all().await?;
        let seeds = self.seed_best_effort().await;
        Ok(ResetReport { migrations, seeds })
    }

    /// Run [`seed`](Self::seed), turning a failure into [`SeedOutcome::Failed`].
    pub async fn seed_best_effort(&self) -> SeedOutcome {
        match self.seed().await {
            Ok(Some(report)) => SeedOutcome::Applied(report),
            Ok(None) => SeedOutcome::Skipped,
            Err(e) => {
                warn!(error = %e, "Seed failed; continuing");
                SeedOutcome::Failed(e.to_string())
            }
        }
    }

    /// Diff live against declared schema and turn the result into a migration.
    ///
    /// A non-dry-run that finds changes writes the file and applies it at once.
    pub async fn author<P, D>(
        &self,
        shadow: &ShadowWorkflow<P, D>,
        options: &AuthorOptions,
    ) -> MigrateResult<AuthorOutcome>
    where
        P: ShadowProvisioner,
        D: SchemaDiffer,
    {
        validate_name(options.name.as_deref())?;
        let schema_dir = MigrationDirectory::new(&self.config.schema_dir);
        let diff = match shadow.generate_diff(&schema_dir, &options.schema).await? {
            ShadowDiff::NoChanges => return Ok(AuthorOutcome::NoChanges),
            ShadowDiff::Changes(diff) => diff,
        };

        if options.dry_run {
            return Ok(AuthorOutcome::Preview(diff));
        }

        let migration = MigrationAuthor::new(&self.config.migrations_dir)
            .write(&diff, options.name.as_deref())
            .await?;
        let applied = self.apply().await?;

        Ok(AuthorOutcome::Written { migration, applied })
    }
}

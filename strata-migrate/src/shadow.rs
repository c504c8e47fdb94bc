//! Shadow database workflow for authoring migrations.
//!
//! A shadow database is a disposable database that holds the *declared*
//! schema, built from the schema directory independently of migration
//! history. Diffing the live database against it yields the SQL needed to
//! bring the live database up to the declared state.
//!
//! # How it works
//!
//! 1. Derive a unique shadow database name from the current time
//! 2. Create the shadow database
//! 3. Apply every schema file to it, in filename order
//! 4. Run the schema differ against the live and shadow databases
//! 5. Drop the shadow database, whatever happened in 3 and 4
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigraDiffer, MigrationDirectory, ShadowConfig, ShadowWorkflow};
//!
//! let workflow = ShadowWorkflow::new(
//!     ShadowConfig::new(database_url),
//!     provisioner,
//!     MigraDiffer::default(),
//! );
//! let diff = workflow
//!     .generate_diff(&MigrationDirectory::new("./schema"), "public")
//!     .await?;
//! ```

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::diff::{DiffOutcome, SchemaDiffer};
use crate::engine::SqlExecutor;
use crate::error::{MigrateResult, MigrationError};
use crate::file::{MigrationDirectory, MigrationSet};

/// Default prefix for shadow database names.
pub const DEFAULT_SHADOW_PREFIX: &str = "shadow_";

/// Configuration for shadow database operations.
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    /// Connection URL of the live database.
    pub base_url: String,
    /// Prefix for shadow database names.
    pub prefix: String,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            prefix: DEFAULT_SHADOW_PREFIX.to_string(),
        }
    }
}

impl ShadowConfig {
    /// Create a new shadow database config.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set a custom prefix for shadow database names.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Generate a shadow database name from the current time.
    pub fn generate_name(&self) -> String {
        format!("{}{}", self.prefix, Utc::now().timestamp_millis())
    }

    /// Connection URL for `db_name`: the live URL with its database segment replaced.
    pub fn shadow_url(&self, db_name: &str) -> String {
        substitute_database(&self.base_url, db_name)
    }
}

/// Replace the last path segment of a connection URL, keeping any query string.
pub fn substitute_database(url: &str, db_name: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };

    let authority_start = base.find("://").map(|i| i + 3).unwrap_or(0);
    let prefix = match base[authority_start..].rfind('/') {
        Some(idx) => &base[..authority_start + idx],
        None => base,
    };

    match query {
        Some(query) => format!("{}/{}?{}", prefix, db_name, query),
        None => format!("{}/{}", prefix, db_name),
    }
}

/// Creates and destroys databases on the live database's server.
#[async_trait::async_trait]
pub trait ShadowProvisioner: Send + Sync {
    /// Create an empty database.
    async fn create_database(&self, name: &str) -> MigrateResult<()>;

    /// Drop a database if it exists.
    async fn drop_database(&self, name: &str) -> MigrateResult<()>;

    /// An executor running SQL inside database `name`.
    fn executor_for(&self, name: &str) -> Box<dyn SqlExecutor>;
}

/// A shadow database for one authoring invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowDatabase {
    name: String,
    url: String,
}

impl ShadowDatabase {
    /// Name a new shadow database.
    pub fn new(config: &ShadowConfig) -> Self {
        let name = config.generate_name();
        let url = config.shadow_url(&name);
        Self { name, url }
    }

    /// Get the shadow database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the full connection URL for this shadow database.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Diff produced by the shadow workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowDiff {
    /// Live schema already matches the declared schema.
    NoChanges,
    /// SQL bringing the live schema to the declared schema.
    Changes(String),
}

/// Runs the create → load → diff → drop sequence.
pub struct ShadowWorkflow<P: ShadowProvisioner, D: SchemaDiffer> {
    config: ShadowConfig,
    provisioner: P,
    differ: D,
}

impl<P: ShadowProvisioner, D: SchemaDiffer> ShadowWorkflow<P, D> {
    /// Create a workflow.
    pub fn new(config: ShadowConfig, provisioner: P, differ: D) -> Self {
        Self {
            config,
            provisioner,
            differ,
        }
    }

    /// Shadow configuration.
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Build the declared schema in a fresh shadow database and diff the live database against it.
    ///
    /// The shadow database is dropped before this returns, on success and on
    /// every error after it was created. When both the workflow and the drop
    /// fail, the workflow error is returned and the drop error is logged.
    pub async fn generate_diff(
        &self,
        schema_dir: &MigrationDirectory,
        schema_filter: &str,
    ) -> MigrateResult<ShadowDiff> {
        let shadow = ShadowDatabase::new(&self.config);

        info!(shadow = %shadow.name(), "Creating shadow database");
        self.provisioner.create_database(shadow.name()).await?;

        let result = self.load_and_diff(&shadow, schema_dir, schema_filter).await;

        let cleanup = self.provisioner.drop_database(shadow.name()).await;
        match (result, cleanup) {
            (result, Ok(())) => {
                debug!(shadow = %shadow.name(), "Dropped shadow database");
                result
            }
            (Ok(_), Err(e)) => Err(MigrationError::ShadowCleanup {
                name: shadow.name().to_string(),
                reason: e.to_string(),
            }),
            (Err(original), Err(e)) => {
                warn!(
                    shadow = %shadow.name(),
                    error = %e,
                    "Failed to drop shadow database after an earlier error"
                );
                Err(original)
            }
        }
    }

    async fn load_and_diff(
        &self,
        shadow: &ShadowDatabase,
        schema_dir: &MigrationDirectory,
        schema_filter: &str,
    ) -> MigrateResult<ShadowDiff> {
        let files = match schema_dir.discover().await? {
            MigrationSet::Missing(dir) => {
                warn!(
                    dir = %dir.display(),
                    "Schema directory not found; diffing against an empty shadow database"
                );
                Vec::new()
            }
            MigrationSet::Found { files, .. } => files,
        };

        let executor = self.provisioner.executor_for(shadow.name());
        for file in &files {
            debug!(file = %file.filename, shadow = %shadow.name(), "Loading schema file");
            let sql = file.read().await?;
            executor
                .execute_batch(&sql)
                .await
                .map_err(|e| MigrationError::SchemaLoadFailed {
                    filename: file.filename.clone(),
                    source: Box::new(e),
                })?;
        }

        match self
            .differ
            .diff(&self.config.base_url, shadow.url(), schema_filter)
            .await
        {
            DiffOutcome::NoChanges => Ok(ShadowDiff::NoChanges),
            DiffOutcome::Diff(text) if text.trim().is_empty() => Ok(ShadowDiff::NoChanges),
            DiffOutcome::Diff(text) => Ok(ShadowDiff::Changes(text)),
            DiffOutcome::Failure(reason) => Err(MigrationError::diff_failed(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryServer, ScriptedDiffer};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_name_uses_prefix() {
        let config = ShadowConfig::new("postgres://localhost/app").with_prefix("_tmp_");
        let name = config.generate_name();
        assert!(name.starts_with("_tmp_"));
        assert!(name["_tmp_".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_shadow_url_substitutes_database() {
        let config = ShadowConfig::new("postgresql://user:pass@db:5432/app");
        assert_eq!(
            config.shadow_url("shadow_1"),
            "postgresql://user:pass@db:5432/shadow_1"
        );
    }

    #[test]
    fn test_substitute_database_keeps_query() {
        assert_eq!(
            substitute_database("postgres://h/app?sslmode=disable", "shadow_1"),
            "postgres://h/shadow_1?sslmode=disable"
        );
        assert_eq!(substitute_database("postgres://h", "shadow_1"), "postgres://h/shadow_1");
    }

    fn schema_dir(sql: &[(&str, &str)]) -> (tempfile::TempDir, MigrationDirectory) {
        let tmp = tempfile::tempdir().unwrap();
        for (name, body) in sql {
            std::fs::write(tmp.path().join(name), body).unwrap();
        }
        let dir = MigrationDirectory::new(tmp.path());
        (tmp, dir)
    }

    #[tokio::test]
    async fn test_generate_diff_loads_schema_in_order_and_drops_shadow() {
        let server = MemoryServer::new();
        let (_tmp, dir) = schema_dir(&[("02_posts.sql", "CREATE TABLE posts ();"), ("01_users.sql", "CREATE TABLE users ();")]);
        let differ = ScriptedDiffer::new(DiffOutcome::Diff("alter table users add column c int;".into()));
        let workflow = ShadowWorkflow::new(
            ShadowConfig::new("postgres://h/live"),
            server.provisioner(),
            differ.clone(),
        );

        let diff = workflow.generate_diff(&dir, "public").await.unwrap();
        assert_eq!(diff, ShadowDiff::Changes("alter table users add column c int;".into()));

        let calls = differ.calls();
        assert_eq!(calls.len(), 1);
        let shadow_name = calls[0].shadow_url.rsplit('/').next().unwrap().to_string();
        assert_eq!(calls[0].live_url, "postgres://h/live");
        assert_eq!(calls[0].schema, "public");
        assert_eq!(
            server.executed(&shadow_name),
            vec!["CREATE TABLE users ();", "CREATE TABLE posts ();"]
        );
        assert!(server.databases().is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_diff_is_no_changes() {
        let server = MemoryServer::new();
        let (_tmp, dir) = schema_dir(&[]);
        let workflow = ShadowWorkflow::new(
            ShadowConfig::new("postgres://h/live"),
            server.provisioner(),
            ScriptedDiffer::new(DiffOutcome::Diff("  \n".into())),
        );

        assert_eq!(workflow.generate_diff(&dir, "public").await.unwrap(), ShadowDiff::NoChanges);
    }

    #[tokio::test]
    async fn test_shadow_dropped_when_schema_load_fails() {
        let server = MemoryServer::new();
        server.fail_when_sql_contains("BROKEN");
        let (_tmp, dir) = schema_dir(&[("01_bad.sql", "BROKEN")]);
        let differ = ScriptedDiffer::new(DiffOutcome::NoChanges);
        let workflow = ShadowWorkflow::new(
            ShadowConfig::new("postgres://h/live"),
            server.provisioner(),
            differ.clone(),
        );

        let err = workflow.generate_diff(&dir, "public").await.unwrap_err();
        assert!(matches!(err, MigrationError::SchemaLoadFailed { .. }));
        assert!(differ.calls().is_empty());
        assert!(server.databases().is_empty());
        assert_eq!(server.dropped().len(), 1);
    }

    #[tokio::test]
    async fn test_shadow_dropped_when_differ_fails() {
        let server = MemoryServer::new();
        let (_tmp, dir) = schema_dir(&[]);
        let workflow = ShadowWorkflow::new(
            ShadowConfig::new("postgres://h/live"),
            server.provisioner(),
            ScriptedDiffer::new(DiffOutcome::Failure("migra exited with code 1".into())),
        );

        let err = workflow.generate_diff(&dir, "public").await.unwrap_err();
        assert!(matches!(err, MigrationError::DiffFailed(_)));
        assert!(server.databases().is_empty());
    }

    #[tokio::test]
    async fn test_drop_failure_does_not_mask_original_error() {
        let server = MemoryServer::new();
        server.fail_drop(true);
        let (_tmp, dir) = schema_dir(&[]);
        let workflow = ShadowWorkflow::new(
            ShadowConfig::new("postgres://h/live"),
            server.provisioner(),
            ScriptedDiffer::new(DiffOutcome::Failure("boom".into())),
        );

        let err = workflow.generate_diff(&dir, "public").await.unwrap_err();
        assert!(matches!(err, MigrationError::DiffFailed(_)));
    }

    #[tokio::test]
    async fn test_drop_failure_after_success_is_reported() {
        let server = MemoryServer::new();
        server.fail_drop(true);
        let (_tmp, dir) = schema_dir(&[]);
        let workflow = ShadowWorkflow::new(
            ShadowConfig::new("postgres://h/live"),
            server.provisioner(),
            ScriptedDiffer::new(DiffOutcome::NoChanges),
        );

        let err = workflow.generate_diff(&dir, "public").await.unwrap_err();
        assert!(matches!(err, MigrationError::ShadowCleanup { .. }));
    }
}

//! # strata-migrate
//!
//! Forward-only migration engine.
//!
//! This crate provides functionality for:
//! - A migration ledger stored in the target database
//! - Discovery of `.sql` migration files in a configured directory
//! - Deterministic, halt-on-failure application of unapplied migrations
//! - Authoring new migrations by diffing the live database against a
//!   disposable shadow database built from the declared schema
//! - Resetting a database and replaying every migration and seed
//!
//! Migrations are append-only: there are no down migrations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Schema Files │────▶│ Shadow DB      │────▶│ Schema Differ│
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                                                    │
//!                                                    ▼
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Ledger Table │◀────│ Apply Engine   │◀────│ Migration    │
//! └──────────────┘     └────────────────┘     │ Files        │
//!                                             └──────────────┘
//! ```
//!
//! The database itself is reached through three traits, implemented for
//! PostgreSQL by `strata-postgres`:
//!
//! - [`MigrationLedger`]: the applied-migrations table
//! - [`SqlExecutor`]: runs a file's SQL as one batch
//! - [`ShadowProvisioner`]: creates and drops shadow databases
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigrationConfig, MigrationEngine};
//!
//! async fn run_migrations() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrationConfig::new().migrations_dir("./migrations");
//!     let engine = MigrationEngine::new(config, ledger, executor);
//!
//!     let report = engine.apply().await?;
//!     println!("{}", report.summary());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! Migrations are plain SQL files applied in filename order:
//!
//! ```text
//! migrations/
//! ├── 20231215120000_create_users.sql
//! └── 20231216090000_add_posts.sql
//! ```

pub mod author;
pub mod diff;
pub mod engine;
pub mod error;
pub mod file;
pub mod history;
pub mod reset;
pub mod shadow;
pub mod sql;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use author::{
    AuthoredMigration, MigrationAuthor, migration_stem, render_migration, slugify, validate_name,
};
pub use diff::{
    DIFFER_NOT_FOUND, DiffOutcome, DifferConfig, MIGRA_DIFF_EXIT_CODE, MigraDiffer, SchemaDiffer,
};
pub use engine::{
    ApplyReport, AuthorOptions, AuthorOutcome, MigrationConfig, MigrationEngine, ResetReport,
    SeedOutcome, SeedReport, SqlExecutor, apply_new, apply_seeds, pending,
};
pub use error::{MigrateResult, MigrationError};
pub use file::{MigrationDirectory, MigrationFile, MigrationSet, is_authored_filename};
pub use history::{LedgerConfig, MigrationLedger, MigrationRecord};
pub use reset::{ResetConfig, clear_sql};
pub use shadow::{
    ShadowConfig, ShadowDatabase, ShadowDiff, ShadowProvisioner, ShadowWorkflow,
    substitute_database,
};
pub use sql::quote_identifier;

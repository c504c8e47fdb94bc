//! CLI command implementations.

pub mod apply;
pub mod migrate;
pub mod reset;

use std::path::PathBuf;

use strata_migrate::{MigrationConfig, MigrationEngine};
use strata_postgres::{PgConfig, PgExecutor, PgLedger};

use crate::cli::Cli;
use crate::config::{Config, project_root};
use crate::error::CliResult;
use crate::output;

/// Everything a command needs, resolved from flags, environment and `strata.toml`.
pub struct Context {
    /// Parsed configuration file (or defaults).
    pub config: Config,
    /// Directory relative paths are resolved against.
    pub root: PathBuf,
    /// Live database URL.
    pub database_url: String,
    /// Live database connection settings.
    pub pg: PgConfig,
    /// Engine settings with resolved directories.
    pub migrations: MigrationConfig,
}

impl Context {
    /// Resolve the context for `cli`.
    pub fn load(cli: &Cli) -> CliResult<Self> {
        let config = Config::load_or_default(&cli.config)?;
        let root = project_root(&cli.config)?;
        let database_url = config.database_url(cli.database_url.as_deref())?;
        let pg = PgConfig::from_url(&database_url)?;
        let migrations = config.migration_config(&root);

        Ok(Self {
            config,
            root,
            database_url,
            pg,
            migrations,
        })
    }

    /// Engine bound to the live database.
    pub fn engine(&self) -> MigrationEngine<PgLedger, PgExecutor> {
        MigrationEngine::new(
            self.migrations.clone(),
            PgLedger::new(self.pg.clone(), self.migrations.ledger.clone()),
            PgExecutor::new(self.pg.clone()),
        )
    }

    /// Print where the command is pointed.
    pub fn print_targets(&self) {
        output::kv("Database", &self.pg.target());
        output::kv("Migrations", &self.migrations.migrations_dir.display().to_string());
        output::newline();
    }
}

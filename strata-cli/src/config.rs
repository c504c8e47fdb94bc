//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use strata_migrate::{
    DifferConfig, LedgerConfig, MigrationConfig, ResetConfig, ShadowConfig,
    history::{DEFAULT_LEDGER_SCHEMA, DEFAULT_LEDGER_TABLE},
    shadow::DEFAULT_SHADOW_PREFIX,
};

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// Default migrations directory (relative to project root)
pub const MIGRATIONS_DIR: &str = "migrations";

/// Default declared-schema directory (relative to project root)
pub const SCHEMA_DIR: &str = "schema";

/// Default seeds directory (relative to project root)
pub const SEEDS_DIR: &str = "seeds";

/// strata CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Migration file locations and ledger
    pub migrations: MigrationsConfig,

    /// Shadow database and differ
    pub shadow: ShadowSettings,

    /// Reset behaviour
    pub reset: ResetConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> CliResult<Self> {
        if path.is_file() {
            tracing::debug!(path = %path.display(), "Loading configuration");
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Connection URL: the command line / `DATABASE_URL` first, then the file.
    pub fn database_url(&self, cli_url: Option<&str>) -> CliResult<String> {
        cli_url
            .map(str::to_string)
            .or_else(|| self.database.url.clone())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                CliError::Config(
                    "DATABASE_URL is not set. Export it or set [database].url in strata.toml"
                        .to_string(),
                )
            })
    }

    /// Engine configuration with directories resolved against `root`.
    pub fn migration_config(&self, root: &Path) -> MigrationConfig {
        let m = &self.migrations;
        let mut candidates = vec![m.directory.clone()];
        candidates.extend(m.search_paths.iter().cloned());

        MigrationConfig::new()
            .migrations_dir(resolve_dir(root, &candidates))
            .schema_dir(root.join(&m.schema_directory))
            .seeds_dir(root.join(&m.seeds_directory))
            .ledger(LedgerConfig::new(&m.ledger_schema, &m.ledger_table))
            .reset(self.reset.clone())
    }

    /// Shadow database settings for the live database at `url`.
    pub fn shadow_config(&self, url: &str) -> ShadowConfig {
        ShadowConfig::new(url).with_prefix(&self.shadow.prefix)
    }

    /// How to invoke the differ.
    pub fn differ_config(&self) -> DifferConfig {
        DifferConfig::new(&self.shadow.differ)
            .with_args(self.shadow.differ_args.iter().cloned())
            .with_timeout(Duration::from_secs(self.shadow.timeout_secs))
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: Option<String>,
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory for migration files
    pub directory: String,

    /// Fallback directories tried in order when `directory` does not exist
    pub search_paths: Vec<String>,

    /// Directory of declared schema files
    pub schema_directory: String,

    /// Directory of seed files
    pub seeds_directory: String,

    /// Schema for the ledger table
    pub ledger_schema: String,

    /// Ledger table name
    pub ledger_table: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: MIGRATIONS_DIR.to_string(),
            search_paths: Vec::new(),
            schema_directory: SCHEMA_DIR.to_string(),
            seeds_directory: SEEDS_DIR.to_string(),
            ledger_schema: DEFAULT_LEDGER_SCHEMA.to_string(),
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }
}

/// Shadow database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Prefix for shadow database names
    pub prefix: String,

    /// Differ executable
    pub differ: String,

    /// Extra differ arguments
    pub differ_args: Vec<String>,

    /// Seconds before the differ is killed
    pub timeout_secs: u64,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        let differ = DifferConfig::default();
        Self {
            prefix: DEFAULT_SHADOW_PREFIX.to_string(),
            differ: differ.program,
            differ_args: differ.args,
            timeout_secs: differ.timeout.as_secs(),
        }
    }
}

/// First candidate that is an existing directory under `root`, else the first candidate.
pub fn resolve_dir(root: &Path, candidates: &[String]) -> PathBuf {
    candidates
        .iter()
        .map(|c| root.join(c))
        .find(|path| path.is_dir())
        .unwrap_or_else(|| root.join(candidates.first().map(String::as_str).unwrap_or(MIGRATIONS_DIR)))
}

/// Directory the configuration file's relative paths are resolved against.
pub fn project_root(config_path: &Path) -> CliResult<PathBuf> {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
        _ => Ok(std::env::current_dir()?),
    }
}

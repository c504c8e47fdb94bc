//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_FILE_NAME;

/// strata - forward-only PostgreSQL migrations
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version)]
#[command(
    about = "Forward-only PostgreSQL migrations authored by diffing a declared schema",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Database connection URL
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Diff the declared schema against the database, write a migration and apply it
    Migrate(MigrateArgs),

    /// Apply pending migrations
    Apply,

    /// Drop everything and re-apply all migrations and seeds
    Reset(ResetArgs),
}

// =============================================================================
// Migrate Command
// =============================================================================

/// Arguments for the `migrate` command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Name for the migration (whitespace becomes `_`)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Print the diff without writing or applying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Schema to compare
    #[arg(short, long, default_value = "public")]
    pub schema: String,
}

// =============================================================================
// Reset Command
// =============================================================================

/// Arguments for the `reset` command
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from([
            "strata", "migrate", "--name", "add users", "--dry-run", "--schema", "app",
        ])
        .unwrap();
        match cli.command {
            Command::Migrate(args) => {
                assert_eq!(args.name.as_deref(), Some("add users"));
                assert!(args.dry_run);
                assert_eq!(args.schema, "app");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["strata", "--database-url", "postgres://h/db", "reset"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("strata.toml"));
        assert_eq!(cli.database_url.as_deref(), Some("postgres://h/db"));
        assert!(matches!(cli.command, Command::Reset(ResetArgs { yes: false })));
    }
}

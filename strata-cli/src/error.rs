//! CLI error types and result alias.

use miette::Diagnostic;
use strata_migrate::MigrationError;
use strata_postgres::PgError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Hint shown when the differ could not be run.
pub const DIFFER_HINT: &str =
    "This might be a migra command issue. Is migra installed and on PATH? (pip install migra)";

/// Hint shown when the database server cannot be reached.
pub const CONNECTION_HINT: &str = "Check that DATABASE_URL points at a reachable server";

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(strata::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(strata::config))]
    Config(String),

    /// Migration error
    #[error("{source}")]
    #[diagnostic(code(strata::migration))]
    Migration {
        /// Underlying engine error.
        source: MigrationError,
        /// What to try next.
        #[help]
        hint: Option<String>,
    },
}

impl CliError {
    /// Help text, if the error carries one.
    pub fn hint(&self) -> Option<String> {
        self.help().map(|h| h.to_string())
    }
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        let hint = match &err {
            _ if err.is_connection_error() => Some(CONNECTION_HINT.to_string()),
            MigrationError::DiffFailed(_) if err.is_differ_missing() => Some(DIFFER_HINT.to_string()),
            MigrationError::ApplyFailed { applied, .. } => Some(format!(
                "{} migration(s) before the failing file were applied and recorded; fix the file and run `strata apply`",
                applied
            )),
            MigrationError::AlreadyExists(_) => {
                Some("Wait a second and retry, or pass a different --name".to_string())
            }
            _ => None,
        };
        CliError::Migration { source: err, hint }
    }
}

impl From<PgError> for CliError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Config(msg) => CliError::Config(msg),
            other => MigrationError::from(other).into(),
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

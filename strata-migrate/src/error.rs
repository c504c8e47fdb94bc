//! Error types for the migration engine.

use thiserror::Error;

use crate::diff::DIFFER_NOT_FOUND;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database server could not be reached or dropped the connection.
    #[error("Cannot connect to database: {0}")]
    Connection(String),

    /// Database operation error (permissions, SQL failures).
    #[error("Database error: {0}")]
    Database(String),

    /// A migration file failed to execute. Files applied earlier in the
    /// same batch stay recorded.
    #[error("Migration '{filename}' failed after {applied} applied in this batch: {source}")]
    ApplyFailed {
        /// File that failed.
        filename: String,
        /// Number of files applied before the failure.
        applied: usize,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// A schema file failed to load into the shadow database.
    #[error("Schema file '{filename}' does not apply cleanly to the shadow database: {source}")]
    SchemaLoadFailed {
        /// Schema file that failed.
        filename: String,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// The schema diff oracle failed.
    #[error("Schema diff failed: {0}")]
    DiffFailed(String),

    /// Shadow database error.
    #[error("Shadow database error: {0}")]
    ShadowDatabaseError(String),

    /// The shadow database could not be dropped.
    #[error("Failed to drop shadow database '{name}': {reason}")]
    ShadowCleanup {
        /// Shadow database name.
        name: String,
        /// Why the drop failed.
        reason: String,
    },

    /// A migration file with the same name already exists.
    #[error("Migration file '{0}' already exists")]
    AlreadyExists(String),

    /// Invalid migration file or name.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a diff failure.
    pub fn diff_failed(msg: impl Into<String>) -> Self {
        Self::DiffFailed(msg.into())
    }

    /// Create a shadow database error.
    pub fn shadow_database(msg: impl Into<String>) -> Self {
        Self::ShadowDatabaseError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Wrap an execution failure for `filename`.
    pub fn apply_failed(filename: impl Into<String>, applied: usize, source: MigrationError) -> Self {
        Self::ApplyFailed {
            filename: filename.into(),
            applied,
            source: Box::new(source),
        }
    }

    /// Number of files applied before this error, when it is a partial apply.
    pub fn applied_before_failure(&self) -> Option<usize> {
        match self {
            Self::ApplyFailed { applied, .. } => Some(*applied),
            _ => None,
        }
    }

    /// Whether the diff oracle executable could not be started.
    pub fn is_differ_missing(&self) -> bool {
        matches!(self, Self::DiffFailed(msg) if msg.contains(DIFFER_NOT_FOUND))
    }

    /// Whether the error is a connectivity failure.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::ApplyFailed { source, .. } => source.is_connection_error(),
            _ => false,
        }
    }
}

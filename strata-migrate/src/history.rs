//! Migration ledger: which migration files have already run.
//!
//! The ledger lives inside the target database in its own schema so that it
//! survives a reset of the working schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;
use crate::sql::{qualified, quote_identifier};

/// Default schema holding the ledger table.
pub const DEFAULT_LEDGER_SCHEMA: &str = "strata";

/// Default ledger table name.
pub const DEFAULT_LEDGER_TABLE: &str = "_strata_migrations";

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Surrogate key.
    pub id: i32,
    /// Migration filename, e.g. `20240101000000_init.sql`.
    pub filename: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// Persistent ledger of applied migrations.
///
/// Every failure is returned to the caller as is; implementations do not
/// retry.
#[async_trait::async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Create the ledger schema and table if they are absent.
    async fn ensure_ledger(&self) -> MigrateResult<()>;

    /// All applied migrations, oldest first.
    async fn list_applied(&self) -> MigrateResult<Vec<MigrationRecord>>;

    /// Record `filename` as applied. Recording an existing filename is a no-op.
    async fn record_applied(&self, filename: &str) -> MigrateResult<()>;
}

/// Where the ledger lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Schema (namespace) of the ledger table.
    pub schema: String,
    /// Ledger table name.
    pub table: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_LEDGER_SCHEMA.to_string(),
            table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Create a ledger config.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Idempotent DDL creating the ledger schema and table.
    pub fn init_sql(&self) -> String {
        format!(
            r#"
CREATE SCHEMA IF NOT EXISTS {schema};
CREATE TABLE IF NOT EXISTS {table} (
    id SERIAL PRIMARY KEY,
    filename VARCHAR(255) UNIQUE NOT NULL,
    applied_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
            schema = quote_identifier(&self.schema),
            table = qualified(&self.schema, &self.table),
        )
    }

    /// Query listing applied migrations, oldest first.
    pub fn list_sql(&self) -> String {
        format!(
            "SELECT id, filename, applied_at FROM {} ORDER BY applied_at, id",
            qualified(&self.schema, &self.table)
        )
    }

    /// Idempotent insert; takes the filename as `$1`.
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (filename) VALUES ($1) ON CONFLICT (filename) DO NOTHING",
            qualified(&self.schema, &self.table)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.schema, "strata");
        assert_eq!(config.table, "_strata_migrations");
    }

    #[test]
    fn test_init_sql_is_idempotent_ddl() {
        let sql = LedgerConfig::default().init_sql();
        assert!(sql.contains("CREATE SCHEMA IF NOT EXISTS \"strata\""));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"strata\".\"_strata_migrations\""));
        assert!(sql.contains("filename VARCHAR(255) UNIQUE NOT NULL"));
        assert!(sql.contains("id SERIAL PRIMARY KEY"));
    }

    #[test]
    fn test_insert_sql_ignores_duplicates() {
        let sql = LedgerConfig::new("ops", "ledger").insert_sql();
        assert!(sql.starts_with("INSERT INTO \"ops\".\"ledger\""));
        assert!(sql.ends_with("ON CONFLICT (filename) DO NOTHING"));
    }

    #[test]
    fn test_list_sql_orders_by_application_time() {
        let sql = LedgerConfig::default().list_sql();
        assert!(sql.contains("ORDER BY applied_at, id"));
    }
}

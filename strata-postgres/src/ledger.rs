//! Ledger table access over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use strata_migrate::{LedgerConfig, MigrateResult, MigrationLedger, MigrationRecord};
use tracing::debug;

use crate::config::PgConfig;
use crate::connection::PgConnection;

/// [`MigrationLedger`] backed by a table in the live database.
#[derive(Debug, Clone)]
pub struct PgLedger {
    config: PgConfig,
    ledger: LedgerConfig,
}

impl PgLedger {
    /// Ledger in the database described by `config`.
    pub fn new(config: PgConfig, ledger: LedgerConfig) -> Self {
        Self { config, ledger }
    }

    /// Where the ledger lives.
    pub fn ledger_config(&self) -> &LedgerConfig {
        &self.ledger
    }
}

#[async_trait]
impl MigrationLedger for PgLedger {
    async fn ensure_ledger(&self) -> MigrateResult<()> {
        let conn = PgConnection::connect(&self.config).await?;
        conn.batch_execute(&self.ledger.init_sql()).await?;
        debug!(schema = %self.ledger.schema, table = %self.ledger.table, "Ledger ready");
        Ok(())
    }

    async fn list_applied(&self) -> MigrateResult<Vec<MigrationRecord>> {
        let conn = PgConnection::connect(&self.config).await?;
        let rows = conn.query(&self.ledger.list_sql(), &[]).await?;

        let records = rows
            .iter()
            .map(|row| {
                let id: i32 = row.try_get("id")?;
                let filename: String = row.try_get("filename")?;
                let applied_at: DateTime<Utc> = row.try_get("applied_at")?;
                Ok(MigrationRecord {
                    id,
                    filename,
                    applied_at,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(crate::error::PgError::from)?;

        debug!(count = records.len(), "Loaded applied migrations");
        Ok(records)
    }

    async fn record_applied(&self, filename: &str) -> MigrateResult<()> {
        let conn = PgConnection::connect(&self.config).await?;
        let inserted = conn.execute(&self.ledger.insert_sql(), &[&filename]).await?;
        if inserted == 0 {
            debug!(migration = %filename, "Migration already recorded");
        }
        Ok(())
    }
}

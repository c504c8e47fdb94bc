//! Running SQL scripts against a database.

use async_trait::async_trait;
use strata_migrate::{MigrateResult, SqlExecutor};

use crate::config::PgConfig;
use crate::connection::PgConnection;

/// [`SqlExecutor`] that opens a fresh connection per script.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    config: PgConfig,
}

impl PgExecutor {
    /// Executor for the database described by `config`.
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    /// Connection settings.
    pub fn config(&self) -> &PgConfig {
        &self.config
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute_batch(&self, sql: &str) -> MigrateResult<()> {
        let conn = PgConnection::connect(&self.config).await?;
        conn.batch_execute(sql).await?;
        Ok(())
    }
}

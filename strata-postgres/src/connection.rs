//! PostgreSQL connection wrapper.

use tokio_postgres::{NoTls, Row};
use tracing::{debug, warn};

use crate::config::{PgConfig, SslMode};
use crate::error::{PgError, PgResult};

/// A single client connection.
///
/// Each migration step opens its own connection and drops it when done;
/// dropping the client ends the background connection task.
pub struct PgConnection {
    client: tokio_postgres::Client,
    target: String,
}

impl PgConnection {
    /// Open a connection described by `config`.
    pub async fn connect(config: &PgConfig) -> PgResult<Self> {
        if config.ssl_mode == SslMode::Require {
            return Err(PgError::config(
                "sslmode=require is not supported; connections are made without TLS",
            ));
        }

        let target = config.target();
        debug!(target = %target, "Connecting to PostgreSQL");

        let (client, connection) = config
            .to_pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| PgError::connection(format!("{}: {}", target, e)))?;

        let task_target = target.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(target = %task_target, error = %e, "PostgreSQL connection closed with error");
            }
        });

        Ok(Self { client, target })
    }

    /// `user@host:port/database` this connection points at.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Execute a query and return all rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> PgResult<Vec<Row>> {
        debug!(sql = %sql, "Executing query");
        let rows = self.client.query(sql, params).await?;
        Ok(rows)
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> PgResult<u64> {
        debug!(sql = %sql, "Executing statement");
        let count = self.client.execute(sql, params).await?;
        Ok(count)
    }

    /// Execute a multi-statement script with the simple query protocol.
    pub async fn batch_execute(&self, sql: &str) -> PgResult<()> {
        debug!(bytes = sql.len(), "Executing batch");
        self.client.batch_execute(sql).await?;
        Ok(())
    }
}

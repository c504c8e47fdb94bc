//! Creating and dropping shadow databases on the live server.

use async_trait::async_trait;
use strata_migrate::{MigrateResult, MigrationError, ShadowProvisioner, SqlExecutor, quote_identifier};
use tracing::{debug, info};

use crate::config::PgConfig;
use crate::connection::PgConnection;
use crate::executor::PgExecutor;

/// [`ShadowProvisioner`] issuing `CREATE DATABASE` / `DROP DATABASE`
/// through the maintenance database.
#[derive(Debug, Clone)]
pub struct PgShadowProvisioner {
    config: PgConfig,
}

impl PgShadowProvisioner {
    /// Provisioner on the server of `config` (the live database).
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    async fn admin(&self) -> MigrateResult<PgConnection> {
        Ok(PgConnection::connect(&self.config.admin()).await?)
    }
}

#[async_trait]
impl ShadowProvisioner for PgShadowProvisioner {
    async fn create_database(&self, name: &str) -> MigrateResult<()> {
        let conn = self.admin().await?;
        conn.batch_execute(&format!("CREATE DATABASE {}", quote_identifier(name)))
            .await
            .map_err(|e| MigrationError::shadow_database(format!("create {}: {}", name, e)))?;
        info!(database = %name, "Created shadow database");
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> MigrateResult<()> {
        let conn = self.admin().await?;
        conn.batch_execute(&format!("DROP DATABASE IF EXISTS {}", quote_identifier(name)))
            .await
            .map_err(|e| MigrationError::shadow_database(format!("drop {}: {}", name, e)))?;
        debug!(database = %name, "Dropped shadow database");
        Ok(())
    }

    fn executor_for(&self, name: &str) -> Box<dyn SqlExecutor> {
        Box::new(PgExecutor::new(self.config.with_database(name)))
    }
}

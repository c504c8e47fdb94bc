//! # strata-postgres
//!
//! PostgreSQL implementations of the strata migration traits.
//!
//! This crate provides:
//! - [`PgLedger`]: the ledger table in the live database
//! - [`PgExecutor`]: runs migration, schema and seed scripts
//! - [`PgShadowProvisioner`]: creates and drops shadow databases
//!
//! Connections are opened per step and closed when the step finishes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigrationConfig, MigrationEngine};
//! use strata_postgres::{PgConfig, PgExecutor, PgLedger};
//!
//! let config = PgConfig::from_url(std::env::var("DATABASE_URL")?)?;
//! let migrations = MigrationConfig::default();
//! let engine = MigrationEngine::new(
//!     migrations.clone(),
//!     PgLedger::new(config.clone(), migrations.ledger.clone()),
//!     PgExecutor::new(config),
//! );
//! let report = engine.apply().await?;
//! println!("{}", report.summary());
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod shadow;

pub use config::{ADMIN_DATABASE, PgConfig, SslMode};
pub use connection::PgConnection;
pub use error::{PgError, PgResult};
pub use executor::PgExecutor;
pub use ledger::PgLedger;
pub use shadow::PgShadowProvisioner;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::PgConfig;
    pub use crate::error::{PgError, PgResult};
    pub use crate::executor::PgExecutor;
    pub use crate::ledger::PgLedger;
    pub use crate::shadow::PgShadowProvisioner;
}

//! # strata
//!
//! Forward-only PostgreSQL migrations authored by diffing a declared schema.
//!
//! strata provides:
//! - A ledger of applied migration files and an engine that applies the rest in order
//! - Migration authoring: load the declared schema into a throwaway shadow
//!   database, diff it against the live one with `migra`, write the diff as a
//!   timestamped file and apply it
//! - A destructive reset that rebuilds the database from the migrations and seeds
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pg = PgConfig::from_url(std::env::var("DATABASE_URL")?)?;
//!     let config = MigrationConfig::default();
//!
//!     let engine = MigrationEngine::new(
//!         config.clone(),
//!         PgLedger::new(pg.clone(), config.ledger.clone()),
//!         PgExecutor::new(pg),
//!     );
//!
//!     println!("{}", engine.apply().await?.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration engine: ledger, discovery, apply, authoring, reset.
pub mod migrate {
    pub use strata_migrate::*;
}

/// PostgreSQL backend.
pub mod postgres {
    pub use strata_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        ApplyReport, AuthorOptions, AuthorOutcome, MigraDiffer, MigrationConfig, MigrationEngine,
        MigrationError, ShadowConfig, ShadowWorkflow,
    };
    pub use crate::postgres::{PgConfig, PgExecutor, PgLedger, PgShadowProvisioner};
}

// Re-export key types at the crate root
pub use strata_migrate::{MigrateResult, MigrationError};

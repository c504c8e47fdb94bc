//! strata CLI - command-line interface for strata migrations.
//!
//! Provides the `strata` binary: `migrate` authors a migration by diffing the
//! declared schema against the live database, `apply` runs pending files, and
//! `reset` rebuilds the database from scratch.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

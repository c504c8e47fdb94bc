//! In-memory stand-ins for the database-facing traits.
//!
//! [`MemoryServer`] plays a database server: each database has a list of
//! executed SQL batches and a set of tables (tracked from `CREATE TABLE` /
//! `DROP TABLE` statements), and the live database carries the ledger.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::diff::{DiffOutcome, SchemaDiffer};
use crate::engine::SqlExecutor;
use crate::error::{MigrateResult, MigrationError};
use crate::history::{MigrationLedger, MigrationRecord};
use crate::reset::CLEAR_SQL_HEADER;
use crate::shadow::ShadowProvisioner;

/// Name of the live database in a [`MemoryServer`].
pub const LIVE_DATABASE: &str = "live";

#[derive(Debug, Default)]
struct ServerState {
    executed: BTreeMap<String, Vec<String>>,
    tables: BTreeMap<String, BTreeSet<String>>,
    databases: BTreeSet<String>,
    dropped: Vec<String>,
    ledger_exists: bool,
    ledger: Vec<MigrationRecord>,
    next_id: i32,
    fail_markers: Vec<String>,
    fail_drop: bool,
    ledger_failure: Option<String>,
}

/// Shared in-memory server state.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger bound to the live database.
    pub fn ledger(&self) -> MemoryLedger {
        MemoryLedger {
            server: self.clone(),
        }
    }

    /// Executor bound to `database`.
    pub fn executor(&self, database: &str) -> MemoryExecutor {
        MemoryExecutor {
            server: self.clone(),
            database: database.to_string(),
        }
    }

    /// Shadow provisioner creating databases on this server.
    pub fn provisioner(&self) -> MemoryProvisioner {
        MemoryProvisioner {
            server: self.clone(),
        }
    }

    /// Fail any batch whose SQL contains `marker`.
    pub fn fail_when_sql_contains(&self, marker: impl Into<String>) {
        self.state.lock().fail_markers.push(marker.into());
    }

    /// Make `drop_database` fail.
    pub fn fail_drop(&self, fail: bool) {
        self.state.lock().fail_drop = fail;
    }

    /// Make every ledger call fail with `message`.
    pub fn fail_ledger(&self, message: impl Into<String>) {
        self.state.lock().ledger_failure = Some(message.into());
    }

    /// Create a table directly, bypassing the executor log.
    pub fn create_table(&self, database: &str, table: &str) {
        self.state
            .lock()
            .tables
            .entry(database.to_string())
            .or_default()
            .insert(table.to_string());
    }

    /// Record `filename` in the ledger directly.
    pub fn seed_ledger(&self, filename: &str) {
        let mut state = self.state.lock();
        state.ledger_exists = true;
        insert_record(&mut state, filename);
    }

    /// SQL batches executed in `database`, in order.
    pub fn executed(&self, database: &str) -> Vec<String> {
        self.state
            .lock()
            .executed
            .get(database)
            .cloned()
            .unwrap_or_default()
    }

    /// Tables currently present in `database`.
    pub fn tables(&self, database: &str) -> Vec<String> {
        self.state
            .lock()
            .tables
            .get(database)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Filenames in the ledger, oldest first.
    pub fn applied_filenames(&self) -> Vec<String> {
        self.state
            .lock()
            .ledger
            .iter()
            .map(|r| r.filename.clone())
            .collect()
    }

    /// Whether the ledger table has been created.
    pub fn ledger_exists(&self) -> bool {
        self.state.lock().ledger_exists
    }

    /// Shadow databases that currently exist.
    pub fn databases(&self) -> Vec<String> {
        self.state.lock().databases.iter().cloned().collect()
    }

    /// Shadow databases dropped so far.
    pub fn dropped(&self) -> Vec<String> {
        self.state.lock().dropped.clone()
    }

    fn ledger_check(&self) -> MigrateResult<()> {
        match &self.state.lock().ledger_failure {
            Some(message) => Err(MigrationError::database(message.clone())),
            None => Ok(()),
        }
    }
}

fn insert_record(state: &mut ServerState, filename: &str) {
    if state.ledger.iter().any(|r| r.filename == filename) {
        return;
    }
    state.next_id += 1;
    let id = state.next_id;
    state.ledger.push(MigrationRecord {
        id,
        filename: filename.to_string(),
        applied_at: Utc::now(),
    });
}

/// [`MigrationLedger`] over a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    server: MemoryServer,
}

#[async_trait::async_trait]
impl MigrationLedger for MemoryLedger {
    async fn ensure_ledger(&self) -> MigrateResult<()> {
        self.server.ledger_check()?;
        self.server.state.lock().ledger_exists = true;
        Ok(())
    }

    async fn list_applied(&self) -> MigrateResult<Vec<MigrationRecord>> {
        self.server.ledger_check()?;
        let state = self.server.state.lock();
        if !state.ledger_exists {
            return Err(MigrationError::database("ledger table does not exist"));
        }
        Ok(state.ledger.clone())
    }

    async fn record_applied(&self, filename: &str) -> MigrateResult<()> {
        self.server.ledger_check()?;
        let mut state = self.server.state.lock();
        if !state.ledger_exists {
            return Err(MigrationError::database("ledger table does not exist"));
        }
        insert_record(&mut state, filename);
        Ok(())
    }
}

/// [`SqlExecutor`] over one database of a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryExecutor {
    server: MemoryServer,
    database: String,
}

#[async_trait::async_trait]
impl SqlExecutor for MemoryExecutor {
    async fn execute_batch(&self, sql: &str) -> MigrateResult<()> {
        let mut state = self.server.state.lock();
        if let Some(marker) = state.fail_markers.iter().find(|m| sql.contains(m.as_str())) {
            return Err(MigrationError::database(format!(
                "syntax error near \"{}\"",
                marker
            )));
        }

        state
            .executed
            .entry(self.database.clone())
            .or_default()
            .push(sql.to_string());

        if sql.starts_with(CLEAR_SQL_HEADER) {
            state.tables.remove(&self.database);
            state.ledger.clear();
            state.next_id = 0;
            return Ok(());
        }

        let tables = state.tables.entry(self.database.clone()).or_default();
        for statement in sql.split(';') {
            let code = strip_comments(statement);
            let words: Vec<&str> = code.split_whitespace().collect();
            match words.as_slice() {
                [verb, kind, name, ..] if kind.eq_ignore_ascii_case("table") => {
                    if verb.eq_ignore_ascii_case("create") {
                        tables.insert(table_name(name));
                    } else if verb.eq_ignore_ascii_case("drop") {
                        tables.remove(&table_name(name));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// `statement` without its `--` comment lines.
fn strip_comments(statement: &str) -> String {
    statement
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn table_name(token: &str) -> String {
    token.split('(').next().unwrap_or(token).to_string()
}

/// [`ShadowProvisioner`] over a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryProvisioner {
    server: MemoryServer,
}

#[async_trait::async_trait]
impl ShadowProvisioner for MemoryProvisioner {
    async fn create_database(&self, name: &str) -> MigrateResult<()> {
        let mut state = self.server.state.lock();
        if !state.databases.insert(name.to_string()) {
            return Err(MigrationError::database(format!(
                "database \"{}\" already exists",
                name
            )));
        }
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> MigrateResult<()> {
        let mut state = self.server.state.lock();
        if state.fail_drop {
            return Err(MigrationError::database(format!(
                "database \"{}\" is being accessed by other users",
                name
            )));
        }
        state.databases.remove(name);
        state.tables.remove(name);
        state.dropped.push(name.to_string());
        Ok(())
    }

    fn executor_for(&self, name: &str) -> Box<dyn SqlExecutor> {
        Box::new(self.server.executor(name))
    }
}

/// One recorded differ invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffCall {
    /// Live database URL.
    pub live_url: String,
    /// Shadow database URL.
    pub shadow_url: String,
    /// Schema filter.
    pub schema: String,
}

/// [`SchemaDiffer`] returning a fixed outcome and recording its calls.
#[derive(Debug, Clone)]
pub struct ScriptedDiffer {
    outcome: DiffOutcome,
    calls: Arc<Mutex<Vec<DiffCall>>>,
}

impl ScriptedDiffer {
    /// Always answer `outcome`.
    pub fn new(outcome: DiffOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Calls so far.
    pub fn calls(&self) -> Vec<DiffCall> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl SchemaDiffer for ScriptedDiffer {
    async fn diff(&self, live_url: &str, shadow_url: &str, schema: &str) -> DiffOutcome {
        self.calls.lock().push(DiffCall {
            live_url: live_url.to_string(),
            shadow_url: shadow_url.to_string(),
            schema: schema.to_string(),
        });
        self.outcome.clone()
    }
}

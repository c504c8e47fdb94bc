//! Destructive reset of the live database.
//!
//! A reset drops every schema outside the protected set, drops the tables,
//! views, sequences and functions of the working schema, and empties the
//! ledger table. Objects that belong to an extension are left alone.

use serde::{Deserialize, Serialize};

use crate::history::LedgerConfig;
use crate::sql::{qualified, quote_literal};

/// Schemas a reset never drops, besides the working and ledger schemas.
pub const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "pg_catalog", "pg_toast"];

/// What a reset clears and what it keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Schema whose objects are dropped one by one instead of dropping the schema.
    pub working_schema: String,
    /// Additional schemas to keep, e.g. ones owned by extensions or other tooling.
    pub protected_schemas: Vec<String>,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            working_schema: "public".to_string(),
            protected_schemas: Vec::new(),
        }
    }
}

impl ResetConfig {
    /// Set the working schema.
    pub fn working_schema(mut self, schema: impl Into<String>) -> Self {
        self.working_schema = schema.into();
        self
    }

    /// Keep `schema` in addition to the defaults.
    pub fn protect(mut self, schema: impl Into<String>) -> Self {
        self.protected_schemas.push(schema.into());
        self
    }

    /// Every schema that survives a reset.
    pub fn protected(&self, ledger: &LedgerConfig) -> Vec<String> {
        let mut schemas: Vec<String> = SYSTEM_SCHEMAS.iter().map(|s| s.to_string()).collect();
        schemas.push(self.working_schema.clone());
        schemas.push(ledger.schema.clone());
        schemas.extend(self.protected_schemas.iter().cloned());

        let mut seen = std::collections::HashSet::new();
        schemas.retain(|s| seen.insert(s.clone()));
        schemas
    }
}

/// First line of the clear script.
pub const CLEAR_SQL_HEADER: &str = "-- strata: reset database";

/// Build the script that clears the database for a reset.
pub fn clear_sql(config: &ResetConfig, ledger: &LedgerConfig) -> String {
    let protected = config
        .protected(ledger)
        .iter()
        .map(|s| quote_literal(s))
        .collect::<Vec<_>>()
        .join(", ");
    let working = quote_literal(&config.working_schema);
    let ledger_table = qualified(&ledger.schema, &ledger.table);

    format!(
        r#"{header}
DO $$ DECLARE
    r RECORD;
BEGIN
    FOR r IN (
        SELECT schema_name
        FROM information_schema.schemata
        WHERE schema_name NOT IN ({protected})
        AND schema_name NOT LIKE 'pg_temp_%'
        AND schema_name NOT LIKE 'pg_toast_temp_%'
    ) LOOP
        EXECUTE 'DROP SCHEMA IF EXISTS ' || quote_ident(r.schema_name) || ' CASCADE';
    END LOOP;

    FOR r IN (
        SELECT c.relname FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = {working} AND c.relkind IN ('r', 'p')
        AND NOT EXISTS (SELECT 1 FROM pg_depend d WHERE d.objid = c.oid AND d.deptype = 'e')
    ) LOOP
        EXECUTE 'DROP TABLE IF EXISTS ' || quote_ident({working}) || '.' || quote_ident(r.relname) || ' CASCADE';
    END LOOP;

    FOR r IN (
        SELECT c.relname, c.relkind FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = {working} AND c.relkind IN ('v', 'm')
        AND NOT EXISTS (SELECT 1 FROM pg_depend d WHERE d.objid = c.oid AND d.deptype = 'e')
    ) LOOP
        IF r.relkind = 'm' THEN
            EXECUTE 'DROP MATERIALIZED VIEW IF EXISTS ' || quote_ident({working}) || '.' || quote_ident(r.relname) || ' CASCADE';
        ELSE
            EXECUTE 'DROP VIEW IF EXISTS ' || quote_ident({working}) || '.' || quote_ident(r.relname) || ' CASCADE';
        END IF;
    END LOOP;

    FOR r IN (
        SELECT c.relname FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = {working} AND c.relkind = 'S'
        AND NOT EXISTS (SELECT 1 FROM pg_depend d WHERE d.objid = c.oid AND d.deptype = 'e')
    ) LOOP
        EXECUTE 'DROP SEQUENCE IF EXISTS ' || quote_ident({working}) || '.' || quote_ident(r.relname) || ' CASCADE';
    END LOOP;

    FOR r IN (
        SELECT p.oid::regprocedure AS signature FROM pg_proc p
        JOIN pg_namespace n ON n.oid = p.pronamespace
        WHERE n.nspname = {working} AND p.prokind IN ('f', 'p')
        AND NOT EXISTS (SELECT 1 FROM pg_depend d WHERE d.objid = p.oid AND d.deptype = 'e')
    ) LOOP
        EXECUTE 'DROP ROUTINE IF EXISTS ' || r.signature || ' CASCADE';
    END LOOP;

    IF to_regclass({ledger_literal}) IS NOT NULL THEN
        EXECUTE format('TRUNCATE TABLE %s RESTART IDENTITY', to_regclass({ledger_literal}));
    END IF;
END $$;
"#,
        header = CLEAR_SQL_HEADER,
        protected = protected,
        working = working,
        ledger_literal = quote_literal(&ledger_table),
    )
}

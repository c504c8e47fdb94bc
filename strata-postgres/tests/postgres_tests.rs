//! Tests against a running PostgreSQL server.
//!
//! Set `STRATA_TEST_DATABASE_URL` to run them; otherwise each test returns early.

use strata_migrate::{
    LedgerConfig, MigrationConfig, MigrationEngine, MigrationLedger, SeedOutcome,
    ShadowProvisioner,
};
use strata_postgres::{PgConfig, PgConnection, PgExecutor, PgLedger, PgShadowProvisioner};

fn test_config() -> Option<PgConfig> {
    let url = std::env::var("STRATA_TEST_DATABASE_URL").ok()?;
    Some(PgConfig::from_url(url).expect("STRATA_TEST_DATABASE_URL is not a valid postgres URL"))
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, chrono::Utc::now().timestamp_micros())
}

#[tokio::test]
async fn test_ledger_round_trip() {
    let Some(config) = test_config() else { return };
    let schema = unique("strata_test");
    let ledger = PgLedger::new(config.clone(), LedgerConfig::new(&schema, "_strata_migrations"));

    ledger.ensure_ledger().await.unwrap();
    ledger.ensure_ledger().await.unwrap();
    assert!(ledger.list_applied().await.unwrap().is_empty());

    ledger.record_applied("0001_init.sql").await.unwrap();
    ledger.record_applied("0002_users.sql").await.unwrap();
    ledger.record_applied("0001_init.sql").await.unwrap();

    let applied: Vec<String> = ledger
        .list_applied()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.filename)
        .collect();
    assert_eq!(applied, vec!["0001_init.sql", "0002_users.sql"]);

    let conn = PgConnection::connect(&config).await.unwrap();
    conn.batch_execute(&format!("DROP SCHEMA \"{}\" CASCADE", schema))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_apply_against_server() {
    let Some(config) = test_config() else { return };
    let schema = unique("strata_apply");
    let tmp = tempfile::tempdir().unwrap();
    let migrations = tmp.path().join("migrations");
    std::fs::create_dir(&migrations).unwrap();
    std::fs::write(
        migrations.join("0001_a.sql"),
        format!("CREATE SCHEMA \"{0}_data\"; CREATE TABLE \"{0}_data\".a (id int);", schema),
    )
    .unwrap();
    std::fs::write(
        migrations.join("0002_b.sql"),
        format!("CREATE TABLE \"{0}_data\".b (id int);", schema),
    )
    .unwrap();

    let migration_config = MigrationConfig::new()
        .migrations_dir(&migrations)
        .ledger(LedgerConfig::new(&schema, "_strata_migrations"));
    let engine = MigrationEngine::new(
        migration_config.clone(),
        PgLedger::new(config.clone(), migration_config.ledger.clone()),
        PgExecutor::new(config.clone()),
    );

    assert_eq!(engine.apply().await.unwrap().count(), 2);
    assert_eq!(engine.apply().await.unwrap().count(), 0);

    let conn = PgConnection::connect(&config).await.unwrap();
    conn.batch_execute(&format!(
        "DROP SCHEMA \"{0}_data\" CASCADE; DROP SCHEMA \"{0}\" CASCADE",
        schema
    ))
    .await
    .unwrap();
}

#[tokio::test]
async fn test_shadow_database_lifecycle() {
    let Some(config) = test_config() else { return };
    let provisioner = PgShadowProvisioner::new(config.clone());
    let name = unique("shadow");

    provisioner.create_database(&name).await.unwrap();
    provisioner
        .executor_for(&name)
        .execute_batch("CREATE TABLE scratch (id int)")
        .await
        .unwrap();
    provisioner.drop_database(&name).await.unwrap();

    let conn = PgConnection::connect(&config).await.unwrap();
    let rows = conn
        .query("SELECT 1 FROM pg_database WHERE datname = $1", &[&name])
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_reset_against_server() {
    let Some(config) = test_config() else { return };
    let provisioner = PgShadowProvisioner::new(config.clone());
    let name = unique("strata_reset");
    provisioner.create_database(&name).await.unwrap();
    let target = config.with_database(&name);

    PgConnection::connect(&target)
        .await
        .unwrap()
        .batch_execute(
            "CREATE TABLE legacy_a (id int); \
             CREATE TABLE legacy_b (id int); \
             CREATE SCHEMA old_app; \
             CREATE TABLE old_app.legacy_c (id int);",
        )
        .await
        .unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let migrations = tmp.path().join("migrations");
    let seeds = tmp.path().join("seeds");
    std::fs::create_dir(&migrations).unwrap();
    std::fs::create_dir(&seeds).unwrap();
    std::fs::write(migrations.join("20240101000000_accounts.sql"), "CREATE TABLE accounts (id int);").unwrap();
    std::fs::write(migrations.join("20240102000000_users.sql"), "CREATE TABLE users (id int);").unwrap();
    std::fs::write(seeds.join("01_accounts.sql"), "INSERT INTO accounts VALUES (1), (2);").unwrap();

    let migration_config = MigrationConfig::new()
        .migrations_dir(&migrations)
        .seeds_dir(&seeds);
    let ledger = PgLedger::new(target.clone(), migration_config.ledger.clone());
    ledger.ensure_ledger().await.unwrap();
    ledger.record_applied("20230101000000_legacy.sql").await.unwrap();

    let engine = MigrationEngine::new(migration_config, ledger, PgExecutor::new(target.clone()));
    let report = engine.reset().await.unwrap();

    assert_eq!(report.migrations.count(), 2);
    assert!(matches!(report.seeds, SeedOutcome::Applied(ref seeded) if seeded.applied.len() == 1));

    let conn = PgConnection::connect(&target).await.unwrap();
    let legacy = conn
        .query(
            "SELECT 1 FROM information_schema.tables WHERE table_name LIKE 'legacy_%'",
            &[],
        )
        .await
        .unwrap();
    assert!(legacy.is_empty());

    let applied: Vec<String> = engine
        .ledger()
        .list_applied()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.filename)
        .collect();
    assert_eq!(applied, vec!["20240101000000_accounts.sql", "20240102000000_users.sql"]);

    let seeded: i64 = conn
        .query("SELECT count(*) FROM accounts", &[])
        .await
        .unwrap()[0]
        .get(0);
    assert_eq!(seeded, 2);

    drop(conn);
    provisioner.drop_database(&name).await.unwrap();
}

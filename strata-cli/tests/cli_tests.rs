//! Integration tests for the strata CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the strata binary, isolated from the caller's environment
#[allow(deprecated)]
fn strata_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("strata").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DATABASE_URL")
        .env_remove("STRATA_LOG")
        .env_remove("STRATA_DEBUG");
    cmd
}

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    strata_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: strata"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("reset"))
        .stdout(predicate::str::contains("--database-url"));
}

#[test]
fn test_migrate_help() {
    let dir = TempDir::new().unwrap();
    strata_cmd(&dir)
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--schema"));
}

#[test]
fn test_reset_help() {
    let dir = TempDir::new().unwrap();
    strata_cmd(&dir)
        .args(["reset", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_unknown_command() {
    let dir = TempDir::new().unwrap();
    strata_cmd(&dir).arg("deploy").assert().failure();
}

#[test]
fn test_apply_without_database_url() {
    let dir = TempDir::new().unwrap();
    strata_cmd(&dir)
        .arg("apply")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DATABASE_URL is not set"));
}

#[test]
fn test_invalid_database_url() {
    let dir = TempDir::new().unwrap();
    strata_cmd(&dir)
        .env("DATABASE_URL", "mysql://localhost/app")
        .arg("apply")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("strata.toml"), "[migrations\ndirectory = 1").unwrap();

    strata_cmd(&dir)
        .env("DATABASE_URL", "postgres://localhost/app")
        .arg("apply")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse TOML"));
}

#[test]
fn test_database_url_from_config_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("strata.toml"),
        "[database]\nurl = \"postgres://app@localhost/from_file\"\n",
    )
    .unwrap();

    strata_cmd(&dir)
        .arg("reset")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("app@localhost:5432/from_file"))
        .stdout(predicate::str::contains("Reset cancelled"));
}

#[test]
fn test_reset_cancelled_without_confirmation() {
    let dir = TempDir::new().unwrap();
    for answer in ["n\n", "\n", "yep\n"] {
        strata_cmd(&dir)
            .env("DATABASE_URL", "postgres://localhost/app")
            .arg("reset")
            .write_stdin(answer)
            .assert()
            .success()
            .stdout(predicate::str::contains("Reset cancelled"));
    }
}

#[test]
fn test_apply_unreachable_database() {
    let dir = TempDir::new().unwrap();
    strata_cmd(&dir)
        .env("DATABASE_URL", "postgres://strata@127.0.0.1:1/app?connect_timeout=2")
        .arg("apply")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot connect to database"))
        .stderr(predicate::str::contains("DATABASE_URL points at a reachable server"));
}

//! Schema differ capability.
//!
//! Computing a diff between two live schemas is delegated to an external
//! oracle. [`SchemaDiffer`] hides how the oracle is invoked; [`MigraDiffer`]
//! runs the `migra` command line tool.
//!
//! `migra` exits with status 2 when it found differences and printed SQL,
//! which callers must not treat as a failure. That rule lives only in
//! [`MigraDiffer::interpret`].

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Exit status `migra` uses for "differences found, SQL printed".
pub const MIGRA_DIFF_EXIT_CODE: i32 = 2;

/// Phrase carried by the failure reported when the differ cannot be spawned.
pub const DIFFER_NOT_FOUND: &str = "executable not found";

/// Default bound on one differ invocation.
pub const DEFAULT_DIFF_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of comparing two schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// The schemas match.
    NoChanges,
    /// SQL that transforms the live schema into the declared one.
    Diff(String),
    /// The oracle could not produce a diff.
    Failure(String),
}

impl DiffOutcome {
    /// Classify differ output: blank text means no changes.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            Self::NoChanges
        } else {
            Self::Diff(text)
        }
    }
}

/// Compares the live database schema with the shadow database schema.
#[async_trait::async_trait]
pub trait SchemaDiffer: Send + Sync {
    /// Produce SQL migrating `live_url` to match `shadow_url`, restricted to `schema`.
    async fn diff(&self, live_url: &str, shadow_url: &str, schema: &str) -> DiffOutcome;
}

/// How to run the differ command.
#[derive(Debug, Clone)]
pub struct DifferConfig {
    /// Program to execute.
    pub program: String,
    /// Extra arguments placed after the two connection targets.
    pub args: Vec<String>,
    /// Wall-clock bound on the invocation.
    pub timeout: Duration,
}

impl Default for DifferConfig {
    fn default() -> Self {
        Self {
            program: "migra".to_string(),
            args: vec!["--unsafe".to_string()],
            timeout: DEFAULT_DIFF_TIMEOUT,
        }
    }
}

impl DifferConfig {
    /// Create a config running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Replace the extra arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`SchemaDiffer`] backed by the `migra` executable.
#[derive(Debug, Clone, Default)]
pub struct MigraDiffer {
    config: DifferConfig,
}

impl MigraDiffer {
    /// Create a differ.
    pub fn new(config: DifferConfig) -> Self {
        Self { config }
    }

    /// The differ configuration.
    pub fn config(&self) -> &DifferConfig {
        &self.config
    }

    /// Arguments for one invocation.
    pub fn command_args(&self, live_url: &str, shadow_url: &str, schema: &str) -> Vec<String> {
        let mut args = vec![live_url.to_string(), shadow_url.to_string()];
        args.extend(self.config.args.iter().cloned());
        args.push("--schema".to_string());
        args.push(schema.to_string());
        args
    }

    /// Map an exit status and captured output to a [`DiffOutcome`].
    pub fn interpret(code: Option<i32>, stdout: &str, stderr: &str) -> DiffOutcome {
        match code {
            Some(0) => DiffOutcome::from_text(stdout),
            Some(MIGRA_DIFF_EXIT_CODE) if !stdout.trim().is_empty() => {
                DiffOutcome::Diff(stdout.to_string())
            }
            Some(code) => DiffOutcome::Failure(format!(
                "migra exited with code {}: {}",
                code,
                failure_detail(stdout, stderr)
            )),
            None => DiffOutcome::Failure(format!(
                "migra was terminated by a signal: {}",
                failure_detail(stdout, stderr)
            )),
        }
    }
}

fn failure_detail(stdout: &str, stderr: &str) -> String {
    let stderr = stderr.trim();
    let stdout = stdout.trim();
    match (stderr.is_empty(), stdout.is_empty()) {
        (false, _) => stderr.to_string(),
        (true, false) => stdout.to_string(),
        (true, true) => "no output".to_string(),
    }
}

#[async_trait::async_trait]
impl SchemaDiffer for MigraDiffer {
    async fn diff(&self, live_url: &str, shadow_url: &str, schema: &str) -> DiffOutcome {
        let args = self.command_args(live_url, shadow_url, schema);
        debug!(program = %self.config.program, schema = %schema, "Running schema differ");

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return DiffOutcome::Failure(format!(
                    "{} {}; is migra installed and on PATH?",
                    self.config.program, DIFFER_NOT_FOUND
                ));
            }
            Err(e) => {
                return DiffOutcome::Failure(format!(
                    "failed to start {}: {}",
                    self.config.program, e
                ));
            }
        };

        match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Err(_) => DiffOutcome::Failure(format!(
                "{} timed out after {}s",
                self.config.program,
                self.config.timeout.as_secs_f64()
            )),
            Ok(Err(e)) => DiffOutcome::Failure(format!("{} failed: {}", self.config.program, e)),
            Ok(Ok(output)) => Self::interpret(
                output.status.code(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
        }
    }
}

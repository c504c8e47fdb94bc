//! Migration file discovery.
//!
//! A migration set is a single directory of `*.sql` files. Files are ordered
//! by their filename string alone; authored names start with a 14-digit UTC
//! timestamp, so lexical order is authoring order.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// A `.sql` file in a migration set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFile {
    /// File name, the identity used by the ledger.
    pub filename: String,
    /// Full path on disk.
    pub path: PathBuf,
}

impl MigrationFile {
    /// Create a migration file entry.
    pub fn new(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
        }
    }

    /// Read the SQL contents.
    pub async fn read(&self) -> MigrateResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(MigrationError::Io)
    }
}

/// Result of looking at a migration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationSet {
    /// The directory does not exist.
    Missing(PathBuf),
    /// The directory exists; `files` may be empty.
    Found {
        /// Directory that was listed.
        dir: PathBuf,
        /// `.sql` files sorted by filename.
        files: Vec<MigrationFile>,
    },
}

impl MigrationSet {
    /// Files in the set, empty when the directory is missing.
    pub fn files(&self) -> &[MigrationFile] {
        match self {
            Self::Missing(_) => &[],
            Self::Found { files, .. } => files,
        }
    }

    /// Consume the set, returning its files.
    pub fn into_files(self) -> Vec<MigrationFile> {
        match self {
            Self::Missing(_) => Vec::new(),
            Self::Found { files, .. } => files,
        }
    }

    /// Whether the directory was absent.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

/// A single configured directory of `.sql` files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDirectory {
    dir: PathBuf,
}

impl MigrationDirectory {
    /// Create a directory handle. The path is used as given.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Ensure the directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(MigrationError::Io)
    }

    /// List the `.sql` files, sorted lexically by filename.
    ///
    /// A missing directory is reported as [`MigrationSet::Missing`], not as an error.
    pub async fn discover(&self) -> MigrateResult<MigrationSet> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(MigrationSet::Missing(self.dir.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MigrationSet::Missing(self.dir.clone()));
            }
            Err(e) => return Err(MigrationError::Io(e)),
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(MigrationError::Io)?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(MigrationError::Io)? {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if !name.ends_with(".sql") {
                continue;
            }
            // Follows symlinks: mounted config volumes link every file.
            match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(file = %name, "Skipping dangling symlink");
                    continue;
                }
                Err(e) => return Err(MigrationError::Io(e)),
            }
            files.push(MigrationFile::new(name, entry.path()));
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));

        tracing::debug!(dir = %self.dir.display(), count = files.len(), "Discovered SQL files");

        Ok(MigrationSet::Found {
            dir: self.dir.clone(),
            files,
        })
    }
}

fn authored_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{14}_[a-z0-9_]+\.sql$").expect("valid regex"))
}

/// Check whether `name` matches `^\d{14}_[a-z0-9_]+\.sql$`.
pub fn is_authored_filename(name: &str) -> bool {
    authored_pattern().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(set: &MigrationSet) -> Vec<&str> {
        set.files().iter().map(|f| f.filename.as_str()).collect()
    }

    #[tokio::test]
    async fn test_discover_sorts_lexically_and_filters_sql() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "20240102000000_users.sql",
            "README.md",
            "20240101000000_init.sql",
            "manual_fix.sql",
            "20240101000000_init.sql.bak",
        ] {
            std::fs::write(dir.path().join(name), "SELECT 1;").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.sql")).unwrap();

        let set = MigrationDirectory::new(dir.path()).discover().await.unwrap();
        assert_eq!(
            names(&set),
            vec![
                "20240101000000_init.sql",
                "20240102000000_users.sql",
                "manual_fix.sql",
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("migrations");

        let set = MigrationDirectory::new(&missing).discover().await.unwrap();
        assert!(set.is_missing());
        assert!(set.files().is_empty());
        assert_eq!(set, MigrationSet::Missing(missing));
    }

    #[tokio::test]
    async fn test_discover_empty_directory_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let set = MigrationDirectory::new(dir.path()).discover().await.unwrap();
        assert!(!set.is_missing());
        assert!(set.files().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let target = shared.path().join("init.sql");
        std::fs::write(&target, "CREATE TABLE t (id int);").unwrap();

        std::os::unix::fs::symlink(&target, dir.path().join("20240101000000_init.sql")).unwrap();
        std::os::unix::fs::symlink(
            shared.path().join("gone.sql"),
            dir.path().join("20240103000000_dangling.sql"),
        )
        .unwrap();
        std::os::unix::fs::symlink(shared.path(), dir.path().join("linked_dir.sql")).unwrap();
        std::fs::write(dir.path().join("20240102000000_users.sql"), "SELECT 1;").unwrap();

        let set = MigrationDirectory::new(dir.path()).discover().await.unwrap();
        assert_eq!(
            names(&set),
            vec!["20240101000000_init.sql", "20240102000000_users.sql"]
        );
        assert_eq!(set.files()[0].read().await.unwrap(), "CREATE TABLE t (id int);");
    }

    #[tokio::test]
    async fn test_read_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240101000000_init.sql");
        std::fs::write(&path, "CREATE TABLE t (id int);").unwrap();

        let file = MigrationFile::new("20240101000000_init.sql", &path);
        assert_eq!(file.read().await.unwrap(), "CREATE TABLE t (id int);");
    }

    #[test]
    fn test_authored_filename_pattern() {
        assert!(is_authored_filename("20240101000000_init.sql"));
        assert!(is_authored_filename("20240101000000_add_users_2.sql"));
        assert!(!is_authored_filename("2024010100000_init.sql"));
        assert!(!is_authored_filename("20240101000000_Init.sql"));
        assert!(!is_authored_filename("20240101000000_.sql"));
        assert!(!is_authored_filename("manual.sql"));
    }
}

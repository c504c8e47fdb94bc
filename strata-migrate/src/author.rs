//! Writing new migration files from a captured diff.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{MigrateResult, MigrationError};
use crate::file::{MigrationDirectory, is_authored_filename};

/// Slug used when no name is given.
pub const DEFAULT_SLUG: &str = "autogen";

/// Lowercase `name` and collapse whitespace runs into `_`.
pub fn slugify(name: Option<&str>) -> String {
    let slug = name
        .map(|n| n.split_whitespace().collect::<Vec<_>>().join("_").to_lowercase())
        .unwrap_or_default();

    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

/// Check that `name` yields a slug of only `a-z`, `0-9` and `_`.
///
/// Returns the slug on success.
pub fn validate_name(name: Option<&str>) -> MigrateResult<String> {
    let slug = slugify(name);
    if slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        Ok(slug)
    } else {
        Err(MigrationError::InvalidMigration(format!(
            "name {:?} may only contain ASCII letters, digits, underscores and whitespace",
            name.unwrap_or_default()
        )))
    }
}

/// `{YYYYMMDDHHMMSS}_{slug}` for a migration authored at `at`.
pub fn migration_stem(at: DateTime<Utc>, name: Option<&str>) -> String {
    format!("{}_{}", at.format("%Y%m%d%H%M%S"), slugify(name))
}

/// File contents: a header naming the migration, then the diff verbatim.
pub fn render_migration(stem: &str, generated_at: DateTime<Utc>, diff: &str) -> String {
    format!(
        "-- Migration: {}\n-- Generated at: {}\n\n{}",
        stem,
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        diff
    )
}

/// A migration file written by [`MigrationAuthor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoredMigration {
    /// File name, e.g. `20240101000000_add_users.sql`.
    pub filename: String,
    /// Path of the new file.
    pub path: PathBuf,
}

/// Writes migration files into the migrations directory.
#[derive(Debug, Clone)]
pub struct MigrationAuthor {
    dir: MigrationDirectory,
}

impl MigrationAuthor {
    /// Create an author for `migrations_dir`.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: MigrationDirectory::new(migrations_dir),
        }
    }

    /// Write `diff` as a new migration stamped with the current time.
    pub async fn write(&self, diff: &str, name: Option<&str>) -> MigrateResult<AuthoredMigration> {
        self.write_at(Utc::now(), diff, name).await
    }

    /// Write `diff` as a new migration stamped with `at`.
    ///
    /// Never overwrites: a file with the same name is an
    /// [`MigrationError::AlreadyExists`] error.
    pub async fn write_at(
        &self,
        at: DateTime<Utc>,
        diff: &str,
        name: Option<&str>,
    ) -> MigrateResult<AuthoredMigration> {
        validate_name(name)?;
        let stem = migration_stem(at, name);
        let filename = format!("{}.sql", stem);
        if !is_authored_filename(&filename) {
            return Err(MigrationError::InvalidMigration(filename));
        }

        self.dir.ensure_dir().await?;
        let path = self.dir.path().join(&filename);

        let file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(MigrationError::AlreadyExists(filename));
            }
            Err(e) => return Err(MigrationError::Io(e)),
        };

        write_or_remove(&path, file, render_migration(&stem, at, diff).as_bytes())
            .await
            .map_err(MigrationError::Io)?;

        tracing::info!(migration = %filename, "Wrote migration file");
        Ok(AuthoredMigration { filename, path })
    }
}

/// Write `contents` through `writer`, removing `path` if the write fails.
///
/// A partial file would be applied and recorded by the next run.
async fn write_or_remove<W>(path: &Path, mut writer: W, contents: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(contents).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        if let Err(remove) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %remove, "Failed to remove partial migration file");
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use pretty_assertions::assert_eq;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify(None), "autogen");
        assert_eq!(slugify(Some("   ")), "autogen");
        assert_eq!(slugify(Some("Add Users")), "add_users");
        assert_eq!(slugify(Some("add \t  posts\nTable")), "add_posts_table");
    }

    #[test]
    fn test_migration_stem() {
        assert_eq!(migration_stem(at(), None), "20240305070809_autogen");
        assert_eq!(migration_stem(at(), Some("Add Users")), "20240305070809_add_users");
        assert!(is_authored_filename(&format!("{}.sql", migration_stem(at(), Some("x y")))));
    }

    #[test]
    fn test_render_migration() {
        let body = render_migration("20240305070809_add_users", at(), "create table users ();\n");
        assert_eq!(
            body,
            "-- Migration: 20240305070809_add_users\n\
             -- Generated at: 2024-03-05T07:08:09.000Z\n\
             \n\
             create table users ();\n"
        );
    }

    #[tokio::test]
    async fn test_write_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let author = MigrationAuthor::new(tmp.path().join("migrations"));

        let written = author
            .write_at(at(), "create table users ();", Some("Add Users"))
            .await
            .unwrap();

        assert_eq!(written.filename, "20240305070809_add_users.sql");
        let contents = std::fs::read_to_string(&written.path).unwrap();
        assert!(contents.starts_with("-- Migration: 20240305070809_add_users\n"));
        assert!(contents.ends_with("create table users ();"));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name(None).unwrap(), "autogen");
        assert_eq!(validate_name(Some("Add Users 2")).unwrap(), "add_users_2");
        for bad in ["add-users", "fix/users", "Café Table", "drop;table"] {
            let err = validate_name(Some(bad)).unwrap_err();
            assert!(matches!(err, MigrationError::InvalidMigration(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_write_rejects_names_outside_authored_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        let author = MigrationAuthor::new(tmp.path().join("migrations"));

        for bad in ["add-users", "fix/users", "Café Table"] {
            let err = author.write_at(at(), "select 1;", Some(bad)).await.unwrap_err();
            assert!(matches!(err, MigrationError::InvalidMigration(_)), "{bad}");
        }
        assert!(!tmp.path().join("migrations").exists());
    }

    /// Accepts `limit` bytes, then fails like a full disk.
    struct FullDisk {
        limit: usize,
    }

    impl AsyncWrite for FullDisk {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            if self.limit == 0 {
                return Poll::Ready(Err(std::io::Error::other("no space left on device")));
            }
            let n = buf.len().min(self.limit);
            self.limit -= n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("20240305070809_partial.sql");
        std::fs::write(&path, "-- Migration: 20240305070809_partial\n").unwrap();

        let err = write_or_remove(&path, FullDisk { limit: 8 }, b"create table users ();")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "no space left on device");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_successful_write_keeps_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("20240305070809_ok.sql");
        std::fs::write(&path, "").unwrap();

        write_or_remove(&path, FullDisk { limit: 64 }, b"select 1;").await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_write_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let author = MigrationAuthor::new(tmp.path());

        author.write_at(at(), "first", None).await.unwrap();
        let err = author.write_at(at(), "second", None).await.unwrap_err();
        assert!(matches!(err, MigrationError::AlreadyExists(ref f) if f == "20240305070809_autogen.sql"));

        let contents = std::fs::read_to_string(tmp.path().join("20240305070809_autogen.sql")).unwrap();
        assert!(contents.ends_with("first"));
    }
}

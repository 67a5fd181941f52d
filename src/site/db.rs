use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// Async-safe handle to the site database.
///
/// Wraps `SiteDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<SiteDb>>,
}

impl DbHandle {
    pub fn new(db: SiteDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&SiteDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct SiteDb {
    conn: Connection,
}

impl SiteDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.run_migrations().context("Failed to run migrations")?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.run_migrations().context("Failed to run migrations")?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );",
            )
            .context("Failed to create settings table")?;
        Ok(())
    }

    // ── Settings (key-value) ─────────────────────────────────────────

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read setting")
    }

    pub fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .context("Failed to write setting")?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])
            .context("Failed to delete setting")?;
        Ok(removed > 0)
    }

    /// Delete `key` only if the JSON field at `json_path` of its value equals `expected`.
    pub fn delete_setting_if_field(&self, key: &str, json_path: &str, expected: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM settings WHERE key = ?1 AND json_extract(value, ?2) = ?3",
                params![key, json_path, expected],
            )
            .context("Failed to conditionally delete setting")?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_crud() {
        let db = SiteDb::new_in_memory().unwrap();
        assert_eq!(db.get_setting("k").unwrap(), None);

        db.put_setting("k", "v1").unwrap();
        assert_eq!(db.get_setting("k").unwrap().as_deref(), Some("v1"));

        db.put_setting("k", "v2").unwrap();
        assert_eq!(db.get_setting("k").unwrap().as_deref(), Some("v2"));

        assert!(db.delete_setting("k").unwrap());
        assert!(!db.delete_setting("k").unwrap());
        assert_eq!(db.get_setting("k").unwrap(), None);
    }

    #[test]
    fn test_conditional_delete_checks_json_field() {
        let db = SiteDb::new_in_memory().unwrap();
        db.put_setting("slot", r#"{"buyOrder":"ORDER_1_5","amount":10}"#)
            .unwrap();

        assert!(!db.delete_setting_if_field("slot", "$.buyOrder", "ORDER_2_5").unwrap());
        assert!(db.get_setting("slot").unwrap().is_some());

        assert!(db.delete_setting_if_field("slot", "$.buyOrder", "ORDER_1_5").unwrap());
        assert!(db.get_setting("slot").unwrap().is_none());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.db");
        {
            let db = SiteDb::new(&path).unwrap();
            db.put_setting("k", "v").unwrap();
        }
        let db = SiteDb::new(&path).unwrap();
        assert_eq!(db.get_setting("k").unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_handle_runs_on_blocking_pool() {
        let handle = DbHandle::new(SiteDb::new_in_memory().unwrap());
        handle.call(|db| db.put_setting("a", "1")).await.unwrap();
        let value = handle.call(|db| db.get_setting("a")).await.unwrap();
        assert_eq!(value.as_deref(), Some("1"));
    }
}

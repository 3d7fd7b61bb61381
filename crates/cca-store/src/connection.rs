//! Connection lifecycle: opening, WAL setup, legacy-layout recovery, and
//! the single `with_transaction` primitive every multi-statement mutation
//! must go through (spec §4.1).

use crate::migrations::{is_legacy_layout, run_migrations};
use cca_core::AppError;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Owns the single write connection to the durable store. Cheap to clone
/// (`Arc` internally) so executions and the adapter layer can share one
/// store instance, matching the single-writer model in spec §5.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Connection>>,
}

impl Store {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if path != Path::new(":memory:") {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            recover_legacy_layout_if_needed(path)?;
        }
        let mut conn = Connection::open(path)?;
        configure(&conn)?;
        run_migrations(&mut conn)?;
        info!("store opened");
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let mut conn = Connection::open_in_memory()?;
        configure(&conn)?;
        run_migrations(&mut conn)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `body` inside a single write transaction, committing on `Ok`
    /// and rolling back on `Err`. Always opens a new transaction: see
    /// spec §9 Open Question #1 — this crate does not attempt to detect
    /// pre-existing nesting, so callers must not call `with_transaction`
    /// from within another `with_transaction` body on the same `Store`
    /// (the inner call would deadlock on the connection mutex, not
    /// silently double-commit).
    #[instrument(skip_all)]
    pub fn with_transaction<T>(
        &self,
        body: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut guard = self.inner.lock();
        let tx = guard.transaction()?;
        let result = body(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    pub(crate) fn with_conn<T>(&self, body: impl FnOnce(&Connection) -> Result<T, AppError>) -> Result<T, AppError> {
        let guard = self.inner.lock();
        body(&guard)
    }
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

fn recover_legacy_layout_if_needed(path: &Path) -> Result<(), AppError> {
    if !path.exists() {
        return Ok(());
    }
    let conn = Connection::open(path)?;
    let legacy = is_legacy_layout(&conn)?;
    drop(conn);
    if !legacy {
        return Ok(());
    }
    let stamp = Utc::now().to_rfc3339().replace([':', '.'], "-");
    let backup = backup_path(path, &stamp);
    warn!(original = %path.display(), backup = %backup.display(), "legacy database layout detected, backing up");
    std::fs::rename(path, &backup)?;
    for ext in ["-wal", "-shm"] {
        let companion = companion_path(path, ext);
        if companion.exists() {
            let backup_companion = backup_path(&companion, &stamp);
            std::fs::rename(companion, backup_companion)?;
        }
    }
    Ok(())
}

fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".backup-{stamp}"));
    path.with_file_name(name)
}

fn companion_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_fresh_database_with_wal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("cca.db")).unwrap();
        store
            .with_conn(|conn| {
                let mode: String = conn
                    .query_row("PRAGMA journal_mode", [], |r| r.get(0))
                    .unwrap();
                assert_eq!(mode.to_lowercase(), "wal");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn with_transaction_commits_on_success() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_transaction(|tx| {
                tx.execute(
                    "INSERT INTO sessions (id, task, status, coder_agent, coder_model, workspace_path, config_snapshot, created_at) VALUES ('s1','t','running','a','m','/tmp','{}','2026-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        store
            .with_conn(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
                    .unwrap();
                assert_eq!(count, 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn with_transaction_rolls_back_on_error() {
        let store = Store::open_in_memory().unwrap();
        let result: Result<(), AppError> = store.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO sessions (id, task, status, coder_agent, coder_model, workspace_path, config_snapshot, created_at) VALUES ('s1','t','running','a','m','/tmp','{}','2026-01-01T00:00:00Z')",
                [],
            )?;
            Err(AppError::Internal("forced failure".into()))
        });
        assert!(result.is_err());
        store
            .with_conn(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
                    .unwrap();
                assert_eq!(count, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn legacy_database_file_is_backed_up_and_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cca.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE some_old_table (id TEXT);")
                .unwrap();
            conn.pragma_update(None, "user_version", 1u32).unwrap();
        }
        let _store = Store::open(&path).unwrap();
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".backup-"))
            .collect();
        assert_eq!(backups.len(), 1);
    }
}

// Embedded SQL store: connection lifecycle, pragmas, schema bootstrap.
//
// A single shared connection guarded by a mutex serves the whole process —
// WAL mode still allows external readers against the same file. Opened once
// at startup, it lives for the process lifetime; every repo method acquires
// the lock, runs its statement(s), and releases on every return path
// (including errors), matching the teacher's session-store pattern.

pub mod cache_repo;
pub mod schema;
pub mod usage_repo;

use std::path::Path;

use log::info;
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::CoreResult;

pub struct Store {
    pub(crate) conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file at `path`, applying all required
    /// pragmas and bootstrapping the schema.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("[store] opening database at {:?}", path);
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        schema::run_migrations(&conn)?;

        Ok(Store { conn: Mutex::new(conn) })
    }

    /// In-memory store for tests: same pragmas (where applicable) and schema.
    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA journal_mode = MEMORY; PRAGMA busy_timeout = 5000;")?;
        schema::run_migrations(&conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    /// Run `VACUUM; ANALYZE;` against the store file. Used by the database
    /// compaction CLI utility.
    pub fn vacuum(&self) -> CoreResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch("VACUUM; ANALYZE;")?;
        Ok(())
    }
}

fn apply_pragmas(conn: &Connection) -> CoreResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -64000;
         PRAGMA busy_timeout = 5000;
         PRAGMA temp_store = MEMORY;
         PRAGMA mmap_size = 268435456;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_parent_dirs_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("tps.db");
        let store = Store::open(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = store.conn.lock();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }

    #[test]
    fn vacuum_runs_without_error() {
        let store = Store::open_in_memory().unwrap();
        store.vacuum().unwrap();
    }
}

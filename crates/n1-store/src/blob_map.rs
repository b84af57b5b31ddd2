//! `KeyedBlobMap`: the durable map the object store is built on top of.
//!
//! This is treated as an external collaborator: a host can swap in any
//! durable key/value backend that satisfies the trait below. [`SqliteBlobMap`]
//! is the concrete implementation this crate ships, with the exact schema
//! the rest of n1 expects a blob map to expose:
//!
//! ```sql
//! CREATE TABLE blobs (
//!     id         INTEGER PRIMARY KEY AUTOINCREMENT,
//!     key        TEXT UNIQUE NOT NULL,
//!     value      BLOB NOT NULL,
//!     created_at INTEGER NOT NULL,
//!     updated_at INTEGER NOT NULL
//! );
//! CREATE TRIGGER blobs_touch_updated_at AFTER UPDATE ON blobs
//! BEGIN
//!     UPDATE blobs SET updated_at = strftime('%s','now') WHERE id = NEW.id;
//! END;
//! ```

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Reserved key used to probe that a blob map is writable and reachable
/// without disturbing any real object. Never surfaced by [`KeyedBlobMap::list_keys`]
/// to callers above the object store.
pub const CANARY_KEY: &str = "__n1_canary__";

/// Durable ordered mapping from a text key to an opaque blob.
///
/// Implementations must make `upsert` atomic with respect to concurrent
/// `get`/`list_keys` calls: a reader must never observe a partially written
/// value.
pub trait KeyedBlobMap: Send + Sync {
    /// Insert or replace the value stored under `key`
    fn upsert(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the value stored under `key`. Returns whether a row was removed
    fn delete(&self, key: &str) -> Result<bool>;

    /// List every key currently present, in no particular order
    fn list_keys(&self) -> Result<Vec<String>>;
}

/// A [`KeyedBlobMap`] backed by a single SQLite database file.
pub struct SqliteBlobMap {
    conn: Mutex<Connection>,
}

impl SqliteBlobMap {
    /// Open (creating if necessary) a SQLite-backed blob map at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory blob map, useful for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS blobs (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                key        TEXT UNIQUE NOT NULL,
                value      BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TRIGGER IF NOT EXISTS blobs_touch_updated_at AFTER UPDATE ON blobs
            BEGIN
                UPDATE blobs SET updated_at = strftime('%s','now') WHERE id = NEW.id;
            END;
            ",
        )?;
        Ok(())
    }
}

impl KeyedBlobMap for SqliteBlobMap {
    fn upsert(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO blobs (key, value, created_at, updated_at)
             VALUES (?1, ?2, strftime('%s','now'), strftime('%s','now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM blobs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM blobs")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_get_roundtrips() {
        let map = SqliteBlobMap::open_in_memory().unwrap();
        map.upsert("k1", b"hello").unwrap();
        assert_eq!(map.get("k1").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn upsert_replaces_existing_value() {
        let map = SqliteBlobMap::open_in_memory().unwrap();
        map.upsert("k1", b"v1").unwrap();
        map.upsert("k1", b"v2").unwrap();
        assert_eq!(map.get("k1").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn missing_key_is_none() {
        let map = SqliteBlobMap::open_in_memory().unwrap();
        assert_eq!(map.get("nope").unwrap(), None);
    }

    #[test]
    fn delete_removes_key() {
        let map = SqliteBlobMap::open_in_memory().unwrap();
        map.upsert("k1", b"v1").unwrap();
        assert!(map.delete("k1").unwrap());
        assert_eq!(map.get("k1").unwrap(), None);
        assert!(!map.delete("k1").unwrap());
    }

    #[test]
    fn list_keys_reflects_current_contents() {
        let map = SqliteBlobMap::open_in_memory().unwrap();
        map.upsert("a", b"1").unwrap();
        map.upsert("b", b"2").unwrap();
        map.delete("a").unwrap();
        assert_eq!(map.list_keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.sqlite3");
        {
            let map = SqliteBlobMap::open(&path).unwrap();
            map.upsert("k", b"v").unwrap();
        }
        let map = SqliteBlobMap::open(&path).unwrap();
        assert_eq!(map.get("k").unwrap(), Some(b"v".to_vec()));
    }
}

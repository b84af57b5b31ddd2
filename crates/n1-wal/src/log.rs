//! The transfer write-ahead log itself.
//!
//! Backed by a SQLite database with two relations:
//!
//! ```sql
//! CREATE TABLE sessions (
//!     id          TEXT PRIMARY KEY,
//!     created     INTEGER NOT NULL,
//!     last_active INTEGER NOT NULL
//! );
//! CREATE TABLE transfers (
//!     session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
//!     digest     TEXT NOT NULL,
//!     direction  TEXT NOT NULL CHECK (direction IN ('send', 'receive')),
//!     offset     INTEGER NOT NULL,
//!     completed  INTEGER NOT NULL,
//!     updated    INTEGER NOT NULL,
//!     PRIMARY KEY (session_id, digest)
//! );
//! ```
//!
//! All operations serialize through a single mutex, matching the
//! single-instance discipline the rest of n1 assumes of its WAL: this keeps
//! ordering between concurrent sessions simple at the cost of some
//! contention, which is acceptable since the WAL only does small, fast
//! writes.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use n1_seal::ObjectDigest;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, WalError};
use crate::session_id::SessionId;

/// Default number of bytes written between forced checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL_BYTES: u64 = 1024 * 1024;

/// Which direction a transfer record is tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Send => "send",
            Direction::Receive => "receive",
        }
    }
}

/// Current durable progress for one (session, digest) transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub offset: u64,
    pub completed: bool,
}

struct Inner {
    conn: Connection,
    bytes_since_checkpoint: AtomicU64,
    checkpoint_interval: u64,
}

/// Crash-safe per-session transfer progress log.
pub struct TransferLog {
    inner: Mutex<Inner>,
}

impl TransferLog {
    /// Open (creating if necessary) a WAL database at `path`, with the
    /// default 1 MiB checkpoint interval
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_interval(path, DEFAULT_CHECKPOINT_INTERVAL_BYTES)
    }

    /// Open a WAL database with a custom checkpoint interval, in bytes
    pub fn open_with_interval(path: impl AsRef<Path>, checkpoint_interval: u64) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, checkpoint_interval)
    }

    /// Open an in-memory WAL, useful for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, DEFAULT_CHECKPOINT_INTERVAL_BYTES)
    }

    fn init(conn: Connection, checkpoint_interval: u64) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                created     INTEGER NOT NULL,
                last_active INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS transfers (
                session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                digest     TEXT NOT NULL,
                direction  TEXT NOT NULL CHECK (direction IN ('send', 'receive')),
                offset     INTEGER NOT NULL,
                completed  INTEGER NOT NULL,
                updated    INTEGER NOT NULL,
                PRIMARY KEY (session_id, digest)
            );
            ",
        )?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                bytes_since_checkpoint: AtomicU64::new(0),
                checkpoint_interval,
            }),
        })
    }

    fn touch_session(conn: &Connection, session_id: &SessionId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO sessions (id, created, last_active) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO UPDATE SET last_active = excluded.last_active",
            params![session_id.to_hex(), now],
        )?;
        Ok(())
    }

    fn log_transfer(
        &self,
        session_id: &SessionId,
        digest: &ObjectDigest,
        direction: Direction,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let now = chrono::Utc::now().timestamp();
        Self::touch_session(&inner.conn, session_id)?;
        inner.conn.execute(
            "INSERT INTO transfers (session_id, digest, direction, offset, completed, updated)
             VALUES (?1, ?2, ?3, 0, 0, ?4)
             ON CONFLICT(session_id, digest) DO NOTHING",
            params![session_id.to_hex(), digest.to_hex(), direction.as_sql(), now],
        )?;
        self.note_write(&mut inner, 64);
        Ok(())
    }

    /// Record that this session has begun sending `digest`, starting a new
    /// transfer record at offset 0 unless one already exists
    pub fn log_send(&self, session_id: &SessionId, digest: &ObjectDigest) -> Result<()> {
        self.log_transfer(session_id, digest, Direction::Send)
    }

    /// Record that this session has begun receiving `digest`
    pub fn log_receive(&self, session_id: &SessionId, digest: &ObjectDigest) -> Result<()> {
        self.log_transfer(session_id, digest, Direction::Receive)
    }

    /// Advance the recorded offset for an in-progress transfer
    pub fn log_progress(
        &self,
        session_id: &SessionId,
        digest: &ObjectDigest,
        offset: u64,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let now = chrono::Utc::now().timestamp();
        let rows = inner.conn.execute(
            "UPDATE transfers SET offset = ?1, updated = ?2
             WHERE session_id = ?3 AND digest = ?4",
            params![offset as i64, now, session_id.to_hex(), digest.to_hex()],
        )?;
        if rows == 0 {
            return Err(WalError::InvalidSession(session_id.to_hex()));
        }
        Self::touch_session(&inner.conn, session_id)?;
        self.note_write(&mut inner, 32);
        Ok(())
    }

    /// Fetch the current progress of a transfer record
    pub fn get_progress(
        &self,
        session_id: &SessionId,
        digest: &ObjectDigest,
    ) -> Result<TransferProgress> {
        let inner = self.inner.lock();
        inner
            .conn
            .query_row(
                "SELECT offset, completed FROM transfers WHERE session_id = ?1 AND digest = ?2",
                params![session_id.to_hex(), digest.to_hex()],
                |row| {
                    let offset: i64 = row.get(0)?;
                    let completed: i64 = row.get(1)?;
                    Ok(TransferProgress {
                        offset: offset as u64,
                        completed: completed != 0,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| WalError::InvalidSession(session_id.to_hex()))
    }

    /// Mark a transfer record complete
    pub fn complete_transfer(&self, session_id: &SessionId, digest: &ObjectDigest) -> Result<()> {
        let mut inner = self.inner.lock();
        let now = chrono::Utc::now().timestamp();
        let rows = inner.conn.execute(
            "UPDATE transfers SET completed = 1, updated = ?1
             WHERE session_id = ?2 AND digest = ?3",
            params![now, session_id.to_hex(), digest.to_hex()],
        )?;
        if rows == 0 {
            return Err(WalError::InvalidSession(session_id.to_hex()));
        }
        Self::touch_session(&inner.conn, session_id)?;
        self.note_write(&mut inner, 32);
        Ok(())
    }

    /// Fetch a session's last-active timestamp (Unix seconds)
    pub fn get_session(&self, session_id: &SessionId) -> Result<i64> {
        let inner = self.inner.lock();
        inner
            .conn
            .query_row(
                "SELECT last_active FROM sessions WHERE id = ?1",
                params![session_id.to_hex()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| WalError::InvalidSession(session_id.to_hex()))
    }

    /// Delete a session and, by cascade, every transfer record under it
    pub fn cleanup_session(&self, session_id: &SessionId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session_id.to_hex()],
        )?;
        self.force_checkpoint(&mut inner);
        Ok(())
    }

    /// Delete every session (and its transfer records) whose last-active
    /// timestamp is older than `max_age_secs`
    pub fn cleanup_expired(&self, max_age_secs: i64) -> Result<usize> {
        let mut inner = self.inner.lock();
        let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
        let rows = inner
            .conn
            .execute("DELETE FROM sessions WHERE last_active < ?1", params![cutoff])?;
        self.force_checkpoint(&mut inner);
        Ok(rows)
    }

    /// Force a final checkpoint and release the underlying connection
    pub fn close(self) {
        let mut inner = self.inner.lock();
        self.force_checkpoint(&mut inner);
    }

    fn note_write(&self, inner: &mut Inner, approx_bytes: u64) {
        let total = inner
            .bytes_since_checkpoint
            .fetch_add(approx_bytes, Ordering::Relaxed)
            + approx_bytes;
        if total >= inner.checkpoint_interval {
            self.force_checkpoint(inner);
        }
    }

    fn force_checkpoint(&self, inner: &mut Inner) {
        if let Err(e) = inner.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);") {
            tracing::error!(error = %e, "WAL checkpoint failed");
        }
        inner.bytes_since_checkpoint.store(0, Ordering::Relaxed);
    }
}

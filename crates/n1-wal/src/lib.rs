//! # n1 WAL
//!
//! A crash-safe, per-session write-ahead log for replication transfer
//! progress. Every object a session sends or receives gets a transfer
//! record tracking its byte offset and completion; on a process crash and
//! reopen, the last logged offset and completed flag are exactly what a
//! resuming session needs to avoid re-transferring data or losing progress.

mod log;
pub mod error;
mod session_id;

pub use error::{Result, WalError};
pub use log::{Direction, TransferLog, TransferProgress, DEFAULT_CHECKPOINT_INTERVAL_BYTES};
pub use session_id::{SessionId, SESSION_ID_LEN};

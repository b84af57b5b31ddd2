//! WAL error types

use thiserror::Error;

/// Result type alias for WAL operations
pub type Result<T> = std::result::Result<T, WalError>;

/// Errors that can occur while recording or querying transfer progress
#[derive(Error, Debug)]
pub enum WalError {
    /// No session/transfer record exists for the requested (sessionID, digest)
    #[error("no session or transfer record for {0}")]
    InvalidSession(String),

    /// Underlying SQLite backend failed
    #[error("WAL backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for WalError {
    fn from(e: rusqlite::Error) -> Self {
        WalError::Backend(e.to_string())
    }
}

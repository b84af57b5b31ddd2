//! Store error types

use thiserror::Error;

/// Result type alias for object store and blob map operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while reading or writing objects through the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// No object exists for the requested digest
    #[error("no object found for digest {0}")]
    NotFound(String),

    /// The sealed bytes stored under a mapped key no longer hash to the
    /// digest that named them; the stale mapping has been evicted
    #[error("stored blob for digest {0} does not hash to that digest")]
    HashMismatch(String),

    /// Sealing/opening the object's sealed form failed
    #[error(transparent)]
    Seal(#[from] n1_seal::SealError),

    /// Underlying blob map backend failed
    #[error("blob map backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

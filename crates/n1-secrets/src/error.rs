//! Secret store error types

use thiserror::Error;

/// Result type alias for secret store operations
pub type Result<T> = std::result::Result<T, SecretError>;

/// Errors that can occur while reading or writing a master key to the host
/// secret store
#[derive(Error, Debug)]
pub enum SecretError {
    /// No secret is stored under the given name
    #[error("no secret found for {0}")]
    NotFound(String),

    /// The stored secret is not a valid 32-byte master key
    #[error("stored secret for {0} has the wrong length")]
    Malformed(String),

    /// Underlying I/O with the secret store backend failed
    #[error("secret store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

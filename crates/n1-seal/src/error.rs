//! Sealing error types

use thiserror::Error;

/// Result type alias for sealing operations
pub type Result<T> = std::result::Result<T, SealError>;

/// Errors that can occur while sealing or opening a blob
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealError {
    /// Sealed form is shorter than nonce + tag and cannot possibly be valid
    #[error("sealed form too short to contain a nonce and tag")]
    InvalidCiphertext,

    /// GCM tag did not verify; ciphertext or key is wrong
    #[error("authentication tag verification failed")]
    AuthFail,

    /// Underlying RNG failed to produce a nonce
    #[error("failed to generate a random nonce")]
    RngFailure,
}

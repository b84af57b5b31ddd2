//! Replicator error types

use thiserror::Error;

/// Result type alias for replicator operations
pub type Result<T> = std::result::Result<T, ReplicatorError>;

/// Errors that can occur while driving a replication session
#[derive(Error, Debug)]
pub enum ReplicatorError {
    /// The peer sent a message that isn't valid in the session's current
    /// state
    #[error("invalid protocol state: {0}")]
    InvalidState(String),

    /// A DATA frame referenced a digest outside the negotiated expected set,
    /// or arrived at an offset that doesn't match WAL progress
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// The peer's handshake was malformed or it otherwise could not be
    /// trusted enough to proceed
    #[error("invalid peer: {0}")]
    InvalidPeer(String),

    /// The session's cancellation scope was cancelled or its deadline
    /// elapsed
    #[error("session cancelled or timed out")]
    Cancelled,

    /// Underlying object store error
    #[error(transparent)]
    Store(#[from] n1_store::StoreError),

    /// Underlying WAL error
    #[error(transparent)]
    Wal(#[from] n1_wal::WalError),

    /// Underlying transport error
    #[error(transparent)]
    Transport(#[from] n1_transport::TransportError),
}

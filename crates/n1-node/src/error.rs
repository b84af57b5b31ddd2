//! Vault/daemon error types

use thiserror::Error;

/// Result type alias for vault and daemon operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors that can occur assembling or driving a vault or daemon
#[derive(Error, Debug)]
pub enum NodeError {
    /// No application key exists under the requested name
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The vault directory already contains an initialized vault
    #[error("vault already initialized at {0}")]
    AlreadyInitialized(String),

    /// The vault has no master key available yet (never initialized, or
    /// the secret store has no entry under either the UUID or legacy name)
    #[error("vault has no master key: {0}")]
    NoMasterKey(String),

    #[error(transparent)]
    Seal(#[from] n1_seal::SealError),

    #[error(transparent)]
    Store(#[from] n1_store::StoreError),

    #[error(transparent)]
    Wal(#[from] n1_wal::WalError),

    #[error(transparent)]
    Secret(#[from] n1_secrets::SecretError),

    #[error(transparent)]
    Replicator(#[from] n1_replicator::ReplicatorError),

    #[error(transparent)]
    Transport(#[from] n1_transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

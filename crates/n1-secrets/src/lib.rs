//! # n1 Secrets
//!
//! The host secret store is an external collaborator: n1 only
//! borrows the master key for the lifetime of a session and never persists
//! it alongside the vault itself. This crate defines the narrow interface
//! the rest of n1 needs (`SecretStore`) and ships one concrete
//! implementation, [`FileSecretStore`], suitable for development and tests.
//! A production deployment is expected to swap in a real OS keyring
//! provider behind the same trait.

pub mod error;
pub mod file_store;
pub mod naming;

pub use error::{Result, SecretError};
pub use file_store::FileSecretStore;

use async_trait::async_trait;
use n1_seal::MasterKey;

/// Interface to a host-native secret store (keyring, file vault, etc).
///
/// Implementations are assumed atomic with respect to concurrent reads from
/// the core — n1 never coordinates external locking itself.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the master key stored under `name`
    async fn get_master_key(&self, name: &str) -> Result<MasterKey>;

    /// Store `key` under `name`, replacing any existing value
    async fn put_master_key(&self, name: &str, key: &MasterKey) -> Result<()>;

    /// Remove the secret stored under `name`, if any
    async fn delete_master_key(&self, name: &str) -> Result<()>;
}

//! Development/test secret store backed by plain files on disk.
//!
//! Each secret is written hex-encoded to `<dir>/<name>.key`. This is not a
//! production-grade secret store — it carries no at-rest protection of its
//! own, unlike an OS keyring — but it satisfies the `SecretStore` contract
//! for local development, integration tests, and the `n1 init`/`n1 keygen`
//! flows.

use std::path::PathBuf;

use async_trait::async_trait;
use n1_seal::MasterKey;

use crate::error::{Result, SecretError};
use crate::SecretStore;

/// A `SecretStore` backed by one file per secret under a directory
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    /// Open (or prepare to create) a file-backed secret store rooted at
    /// `dir`. The directory is created on first write if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.key"))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_master_key(&self, name: &str) -> Result<MasterKey> {
        let path = self.path_for(name);
        let hex_contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SecretError::NotFound(name.to_string()),
                _ => SecretError::Io(e),
            })?;

        let bytes = hex::decode(hex_contents.trim())
            .map_err(|_| SecretError::Malformed(name.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SecretError::Malformed(name.to_string()))?;
        Ok(MasterKey::from_bytes(arr))
    }

    async fn put_master_key(&self, name: &str, key: &MasterKey) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(name);
        tokio::fs::write(&path, hex::encode(key.as_bytes())).await?;
        tracing::debug!(secret = name, "wrote master key to file secret store");
        Ok(())
    }

    async fn delete_master_key(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SecretError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_put_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        let key = MasterKey::generate();

        store.put_master_key("n1_vault_test", &key).await.unwrap();
        let fetched = store.get_master_key("n1_vault_test").await.unwrap();
        assert_eq!(fetched.as_bytes(), key.as_bytes());
    }

    #[tokio::test]
    async fn missing_secret_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        let err = store.get_master_key("nope").await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        let key = MasterKey::generate();
        store.put_master_key("k", &key).await.unwrap();
        store.delete_master_key("k").await.unwrap();
        assert!(store.get_master_key("k").await.is_err());
    }

    #[tokio::test]
    async fn delete_nonexistent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        store.delete_master_key("never-existed").await.unwrap();
    }
}

//! `Vault`: the handle the CLI and daemon binary actually drive.
//!
//! Composes [`n1_store::ObjectStore`] (and the underlying
//! [`n1_store::SqliteBlobMap`]), a [`n1_secrets::SecretStore`], and the
//! vault's [`n1_store::VaultMetadata`]. This is the piece spec.md §6
//! describes only by its CLI surface ("init", "open", "put", "get", "key
//! rotate") and treats as a black box; the type here is what actually
//! backs those subcommands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use n1_secrets::{naming, FileSecretStore, SecretStore};
use n1_seal::MasterKey;
use n1_store::{KeyedBlobMap, ObjectStore, SqliteBlobMap, VaultMetadata};
use uuid::Uuid;

use crate::config::VaultConfig;
use crate::error::{NodeError, Result};

/// A single host's durable vault: blob map, object store, and the secret
/// store handle used to fetch its master key per operation.
pub struct Vault {
    path: PathBuf,
    uuid: Uuid,
    store: Arc<ObjectStore>,
    metadata: VaultMetadata,
    secrets: Arc<dyn SecretStore>,
}

impl Vault {
    /// Initialize a brand-new vault at `config.vault.path`: generate a
    /// master key, persist it to the secret store, create the vault file,
    /// and assign a fresh UUID. Fails if a vault already exists there.
    pub async fn init(config: &VaultConfig) -> Result<Self> {
        if config.vault.path.exists() {
            return Err(NodeError::AlreadyInitialized(
                config.vault.path.display().to_string(),
            ));
        }

        let map: Arc<dyn KeyedBlobMap> = Arc::new(SqliteBlobMap::open(&config.vault.path)?);
        let metadata = VaultMetadata::new(Arc::clone(&map));
        let uuid = metadata.vault_uuid_or_init()?;

        let secrets: Arc<dyn SecretStore> = Arc::new(FileSecretStore::new(&config.vault.secrets_dir));
        let master_key = MasterKey::generate();
        secrets.put_master_key(&naming::primary_name(&uuid), &master_key).await?;

        let store = Arc::new(ObjectStore::open(map)?);
        tracing::info!(path = %config.vault.path.display(), vault_uuid = %uuid, "vault initialized");

        Ok(Self {
            path: config.vault.path.clone(),
            uuid,
            store,
            metadata,
            secrets,
        })
    }

    /// Open an existing vault, asserting both that its file is accessible
    /// and that a master key is available under its UUID (preferred) or
    /// its absolute path (legacy fallback, §3).
    pub async fn open(config: &VaultConfig) -> Result<Self> {
        let map: Arc<dyn KeyedBlobMap> = Arc::new(SqliteBlobMap::open(&config.vault.path)?);
        let metadata = VaultMetadata::new(Arc::clone(&map));
        let uuid = metadata.vault_uuid_or_init()?;

        let secrets: Arc<dyn SecretStore> = Arc::new(FileSecretStore::new(&config.vault.secrets_dir));
        // Assert the key is actually reachable before handing back a handle
        // callers will use for get/put; §6 "open" is "assert key presence
        // and vault accessibility".
        Self::fetch_master_key(secrets.as_ref(), &uuid, &config.vault.path).await?;

        let store = Arc::new(ObjectStore::open(map)?);
        Ok(Self {
            path: config.vault.path.clone(),
            uuid,
            store,
            metadata,
            secrets,
        })
    }

    async fn fetch_master_key(
        secrets: &dyn SecretStore,
        uuid: &Uuid,
        path: &Path,
    ) -> Result<MasterKey> {
        let primary = naming::primary_name(uuid);
        match secrets.get_master_key(&primary).await {
            Ok(key) => Ok(key),
            Err(_) => {
                let legacy = naming::legacy_name(path);
                secrets.get_master_key(&legacy).await.map_err(|_| {
                    NodeError::NoMasterKey(format!("{primary} (and legacy {legacy})"))
                })
            }
        }
    }

    async fn master_key(&self) -> Result<MasterKey> {
        Self::fetch_master_key(self.secrets.as_ref(), &self.uuid, &self.path).await
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The object store this vault wraps, shared with a daemon's or a
    /// sync session's replicator as an `Arc` so both can hold it
    /// concurrently without a second SQLite connection
    pub fn object_store(&self) -> Arc<ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Store `value` under the application key `key`
    pub async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let master_key = self.master_key().await?;
        self.store.put_named(&master_key, key, value)?;
        Ok(())
    }

    /// Fetch and decrypt the value stored under the application key `key`
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let master_key = self.master_key().await?;
        Ok(self.store.get_named(&master_key, key)?)
    }

    /// Does an application key exist in this vault?
    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.store.has_named(key)?)
    }

    /// List every object digest currently in the vault (excludes the
    /// canary and reserved metadata entries, per I5)
    pub fn list_digests(&self) -> Vec<n1_seal::ObjectDigest> {
        self.store.list()
    }

    /// Rotate the vault's master key: decrypt every row under the old key,
    /// re-encrypt under a freshly generated one, update each row in place
    /// under its existing identity (named rows keep their application key;
    /// digest-keyed rows move to their new digest's hex key), and finally
    /// replace the secret-store entry. Non-atomic w.r.t. crashes — a
    /// failure partway through leaves a mixed vault (§7, §9): this is a
    /// recorded limitation, not a bug to work around here.
    ///
    /// `dry_run` performs the decrypt pass (proving every row is currently
    /// readable) without writing anything back or touching the secret
    /// store.
    pub async fn rotate_key(&self, dry_run: bool) -> Result<()> {
        let old_key = self.master_key().await?;
        let entries = self.store.entries();

        let mut decrypted: Vec<(String, n1_seal::ObjectDigest, Vec<u8>)> = Vec::with_capacity(entries.len());
        for (user_key, digest) in &entries {
            let plaintext = self.store.get(&old_key, digest)?;
            decrypted.push((user_key.clone(), *digest, plaintext));
        }

        if dry_run {
            tracing::info!(objects = decrypted.len(), "rotate --dry-run: all objects decrypted cleanly");
            return Ok(());
        }

        let new_key = MasterKey::generate();
        for (user_key, old_digest, plaintext) in &decrypted {
            self.store.reseal_entry(&new_key, user_key, old_digest, plaintext)?;
        }

        self.secrets
            .put_master_key(&naming::primary_name(&self.uuid), &new_key)
            .await?;
        tracing::info!(objects = decrypted.len(), vault_uuid = %self.uuid, "master key rotated");
        Ok(())
    }

    /// Destroy this vault: remove the vault file, its WAL sidecar if
    /// present, and the secret-store entry for its master key
    pub async fn destroy(config: &VaultConfig) -> Result<()> {
        let metadata_map: Arc<dyn KeyedBlobMap> = Arc::new(SqliteBlobMap::open(&config.vault.path)?);
        let metadata = VaultMetadata::new(metadata_map);
        let uuid = metadata.vault_uuid()?;

        if std::fs::metadata(&config.vault.path).is_ok() {
            std::fs::remove_file(&config.vault.path)?;
        }
        let wal_path = config.wal_path();
        if wal_path.exists() {
            std::fs::remove_file(&wal_path)?;
        }

        if let Some(uuid) = uuid {
            let secrets = FileSecretStore::new(&config.vault.secrets_dir);
            secrets.delete_master_key(&naming::primary_name(&uuid)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> VaultConfig {
        VaultConfig::for_vault_path(dir.path().join("test.vault"))
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let vault = Vault::init(&config).await.unwrap();
        vault.put("k", b"hello").await.unwrap();
        assert_eq!(vault.get("k").await.unwrap(), b"hello");
        assert!(vault.has("k").unwrap());
    }

    #[tokio::test]
    async fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        Vault::init(&config).await.unwrap();
        let err = Vault::init(&config).await.unwrap_err();
        assert!(matches!(err, NodeError::AlreadyInitialized(_)));
    }

    #[tokio::test]
    async fn open_after_init_shares_the_same_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let uuid = Vault::init(&config).await.unwrap().uuid();
        let reopened = Vault::open(&config).await.unwrap();
        assert_eq!(reopened.uuid(), uuid);
    }

    #[tokio::test]
    async fn open_with_tampered_master_key_fails_closed_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let vault = Vault::init(&config).await.unwrap();
        vault.put("k", b"hello").await.unwrap();

        // Overwrite the stored master key, simulating scenario 2 from
        // spec.md §8.
        let secrets = FileSecretStore::new(&config.vault.secrets_dir);
        let bogus = MasterKey::generate();
        secrets
            .put_master_key(&naming::primary_name(&vault.uuid()), &bogus)
            .await
            .unwrap();

        let err = vault.get("k").await.unwrap_err();
        assert!(matches!(err, NodeError::Store(_)));
    }

    #[tokio::test]
    async fn rotate_key_preserves_plaintext_and_changes_secret() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let vault = Vault::init(&config).await.unwrap();
        vault.put("k", b"hello").await.unwrap();

        let secrets = FileSecretStore::new(&config.vault.secrets_dir);
        let before = secrets
            .get_master_key(&naming::primary_name(&vault.uuid()))
            .await
            .unwrap();

        vault.rotate_key(false).await.unwrap();

        let after = secrets
            .get_master_key(&naming::primary_name(&vault.uuid()))
            .await
            .unwrap();
        assert_ne!(before.as_bytes(), after.as_bytes());
        assert_eq!(vault.get("k").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn rotate_key_updates_digest_keyed_rows_in_place_too() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let vault = Vault::init(&config).await.unwrap();
        vault.put("k", b"hello").await.unwrap();
        let anon_digest = vault.object_store().put_plaintext(&vault.master_key().await.unwrap(), b"anon").unwrap();

        vault.rotate_key(false).await.unwrap();

        // The old digest-keyed row must not survive rotation as an
        // orphaned, now-unreadable entry under the old key's sealed bytes.
        assert!(!vault.object_store().has(&anon_digest));
        assert_eq!(vault.object_store().list().len(), 2);
        assert_eq!(vault.get("k").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn dry_run_rotation_does_not_change_the_secret() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let vault = Vault::init(&config).await.unwrap();
        vault.put("k", b"hello").await.unwrap();

        let secrets = FileSecretStore::new(&config.vault.secrets_dir);
        let before = secrets
            .get_master_key(&naming::primary_name(&vault.uuid()))
            .await
            .unwrap();

        vault.rotate_key(true).await.unwrap();

        let after = secrets
            .get_master_key(&naming::primary_name(&vault.uuid()))
            .await
            .unwrap();
        assert_eq!(before.as_bytes(), after.as_bytes());
    }

    #[tokio::test]
    async fn destroy_removes_vault_and_secret() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let vault = Vault::init(&config).await.unwrap();
        vault.put("k", b"hello").await.unwrap();
        let uuid = vault.uuid();
        drop(vault);

        Vault::destroy(&config).await.unwrap();
        assert!(!config.vault.path.exists());

        let secrets = FileSecretStore::new(&config.vault.secrets_dir);
        assert!(secrets.get_master_key(&naming::primary_name(&uuid)).await.is_err());
    }
}

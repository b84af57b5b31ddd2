//! Vault metadata: a thin typed wrapper over a [`KeyedBlobMap`], storing
//! small reserved values (currently just the vault's UUID) alongside the
//! object blobs without needing a schema of its own.
//!
//! Reserved keys live under the `__n1_meta_*__` namespace, which — like the
//! canary key — is never surfaced through [`crate::ObjectStore::list`].

use std::sync::Arc;

use uuid::Uuid;

use crate::blob_map::KeyedBlobMap;
use crate::error::Result;

const VAULT_UUID_KEY: &str = "__n1_meta_vault_uuid__";

/// Is `key` a reserved metadata key, i.e. one that should never be treated
/// as an application or digest key by the object store?
pub fn is_reserved(key: &str) -> bool {
    key.starts_with("__n1_meta_") || key == crate::blob_map::CANARY_KEY
}

/// Read/write access to a vault's small set of reserved metadata values
pub struct VaultMetadata {
    map: Arc<dyn KeyedBlobMap>,
}

impl VaultMetadata {
    /// Wrap an existing blob map for metadata access
    pub fn new(map: Arc<dyn KeyedBlobMap>) -> Self {
        Self { map }
    }

    /// Fetch the vault's persisted UUID, if one has been assigned
    pub fn vault_uuid(&self) -> Result<Option<Uuid>> {
        let Some(bytes) = self.map.get(VAULT_UUID_KEY)? else {
            return Ok(None);
        };
        Ok(Uuid::from_slice(&bytes).ok())
    }

    /// Assign (or overwrite) the vault's UUID
    pub fn set_vault_uuid(&self, uuid: &Uuid) -> Result<()> {
        self.map.upsert(VAULT_UUID_KEY, uuid.as_bytes())
    }

    /// Fetch and, if absent, generate and persist a vault UUID. This makes
    /// `vault_uuid` usable as a stable identity from the very first call.
    pub fn vault_uuid_or_init(&self) -> Result<Uuid> {
        if let Some(uuid) = self.vault_uuid()? {
            return Ok(uuid);
        }
        let uuid = Uuid::new_v4();
        self.set_vault_uuid(&uuid)?;
        Ok(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_map::SqliteBlobMap;

    #[test]
    fn uuid_is_none_until_assigned() {
        let map: Arc<dyn KeyedBlobMap> = Arc::new(SqliteBlobMap::open_in_memory().unwrap());
        let meta = VaultMetadata::new(map);
        assert_eq!(meta.vault_uuid().unwrap(), None);
    }

    #[test]
    fn vault_uuid_or_init_is_stable() {
        let map: Arc<dyn KeyedBlobMap> = Arc::new(SqliteBlobMap::open_in_memory().unwrap());
        let meta = VaultMetadata::new(map);
        let first = meta.vault_uuid_or_init().unwrap();
        let second = meta.vault_uuid_or_init().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reserved_keys_are_recognized() {
        assert!(is_reserved(VAULT_UUID_KEY));
        assert!(is_reserved(crate::blob_map::CANARY_KEY));
        assert!(!is_reserved("some-app-key"));
    }
}

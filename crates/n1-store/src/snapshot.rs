//! The in-memory `{digest <-> userKey}` index the object store keeps on top
//! of the blob map, and the atomic snapshot-swap it is rebuilt under.
//!
//! A snapshot is an immutable, cheaply-`Arc`-cloned value. Readers take the
//! current snapshot under a read lock and then drop the lock immediately;
//! a rebuild constructs a brand new snapshot off to the side and only then
//! takes the write lock to swap it in. A reader therefore always sees either
//! the pre-rebuild or the post-rebuild view, never a partially rebuilt one.

use std::collections::HashMap;
use std::sync::Arc;

use n1_seal::ObjectDigest;
use parking_lot::RwLock;

use crate::blob_map::{KeyedBlobMap, CANARY_KEY};
use crate::error::Result;
use crate::metadata::is_reserved;

#[derive(Default)]
pub(crate) struct Snapshot {
    digest_to_key: HashMap<ObjectDigest, String>,
}

impl Snapshot {
    fn build(map: &dyn KeyedBlobMap) -> Result<Self> {
        let mut digest_to_key = HashMap::new();
        for key in map.list_keys()? {
            if key == CANARY_KEY || is_reserved(&key) {
                continue;
            }
            if let Some(digest) = ObjectDigest::from_hex(&key) {
                // Digest-keyed entry: the key itself is the claimed identity.
                // get() always re-verifies this against the stored bytes, so
                // trusting it here is just an optimization, never a fast path
                // around I2.
                digest_to_key.insert(digest, key);
            } else if let Some(sealed) = map.get(&key)? {
                let digest = ObjectDigest::of_sealed(&sealed);
                digest_to_key.insert(digest, key);
            }
        }
        Ok(Self { digest_to_key })
    }

    fn key_for(&self, digest: &ObjectDigest) -> Option<&str> {
        self.digest_to_key.get(digest).map(String::as_str)
    }

    fn entries(&self) -> Vec<(String, ObjectDigest)> {
        self.digest_to_key.iter().map(|(digest, key)| (key.clone(), *digest)).collect()
    }
}

/// Thread-safe holder of the current snapshot, with rebuild-on-demand and
/// eviction of stale single entries.
pub(crate) struct SnapshotCell {
    inner: RwLock<Arc<Snapshot>>,
}

impl SnapshotCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub(crate) fn current(&self) -> Arc<Snapshot> {
        self.inner.read().clone()
    }

    /// Rebuild the snapshot from scratch by rescanning the blob map
    pub(crate) fn rebuild(&self, map: &dyn KeyedBlobMap) -> Result<()> {
        let fresh = Snapshot::build(map)?;
        *self.inner.write() = Arc::new(fresh);
        Ok(())
    }

    /// Insert a single freshly-learned mapping without a full rebuild
    pub(crate) fn learn(&self, digest: ObjectDigest, key: String) {
        let mut guard = self.inner.write();
        let mut next = (**guard).clone_map();
        next.insert(digest, key);
        *guard = Arc::new(Snapshot {
            digest_to_key: next,
        });
    }

    /// Evict a single mapping, e.g. after discovering its stored bytes no
    /// longer hash to the digest that named it
    pub(crate) fn evict(&self, digest: &ObjectDigest) {
        let mut guard = self.inner.write();
        let mut next = (**guard).clone_map();
        next.remove(digest);
        *guard = Arc::new(Snapshot {
            digest_to_key: next,
        });
    }

    pub(crate) fn key_for(&self, digest: &ObjectDigest) -> Option<String> {
        self.current().key_for(digest).map(str::to_owned)
    }

    pub(crate) fn list(&self) -> Vec<ObjectDigest> {
        self.current().digest_to_key.keys().copied().collect()
    }

    /// Every `(userKey, digest)` pair currently known, for callers that
    /// need to rewrite rows by name rather than just enumerate digests
    pub(crate) fn entries(&self) -> Vec<(String, ObjectDigest)> {
        self.current().entries()
    }
}

impl Snapshot {
    fn clone_map(&self) -> HashMap<ObjectDigest, String> {
        self.digest_to_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_map::SqliteBlobMap;

    #[test]
    fn rebuild_picks_up_digest_and_app_keyed_entries() {
        let map = SqliteBlobMap::open_in_memory().unwrap();
        let sealed = b"sealed-bytes-for-test".to_vec();
        let digest = ObjectDigest::of_sealed(&sealed);
        map.upsert(&digest.to_hex(), &sealed).unwrap();
        map.upsert("my-app-key", &sealed).unwrap();

        let cell = SnapshotCell::new();
        cell.rebuild(&map).unwrap();

        assert_eq!(cell.key_for(&digest), Some(digest.to_hex()));
    }

    #[test]
    fn reserved_keys_are_excluded_from_rebuild() {
        let map = SqliteBlobMap::open_in_memory().unwrap();
        map.upsert(CANARY_KEY, b"probe").unwrap();
        map.upsert("__n1_meta_vault_uuid__", b"1234").unwrap();

        let cell = SnapshotCell::new();
        cell.rebuild(&map).unwrap();
        assert!(cell.list().is_empty());
    }

    #[test]
    fn evict_removes_a_single_mapping() {
        let map = SqliteBlobMap::open_in_memory().unwrap();
        let sealed = b"bytes".to_vec();
        let digest = ObjectDigest::of_sealed(&sealed);
        map.upsert(&digest.to_hex(), &sealed).unwrap();

        let cell = SnapshotCell::new();
        cell.rebuild(&map).unwrap();
        assert!(cell.key_for(&digest).is_some());

        cell.evict(&digest);
        assert!(cell.key_for(&digest).is_none());
    }
}

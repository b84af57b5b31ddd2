//! Content-addressed view over a [`KeyedBlobMap`]: objects are identified by
//! the SHA-256 digest of their sealed form, not by the key the blob happens
//! to be stored under.

use std::io::{self, Read};
use std::sync::Arc;

use n1_seal::{open, seal, MasterKey, ObjectDigest};

use crate::blob_map::KeyedBlobMap;
use crate::error::{Result, StoreError};
use crate::snapshot::SnapshotCell;

/// Content-addressed object store built atop a durable [`KeyedBlobMap`].
///
/// Object identity is the digest of the *sealed* bytes. `put` is keyed by
/// the digest it's told to store under — callers that want a human-readable
/// alias instead (the `userKey` form) use [`ObjectStore::put_named`].
pub struct ObjectStore {
    map: Arc<dyn KeyedBlobMap>,
    snapshot: SnapshotCell,
}

impl ObjectStore {
    /// Wrap a blob map as a content-addressed object store, performing an
    /// initial index build from whatever the map already contains
    pub fn open(map: Arc<dyn KeyedBlobMap>) -> Result<Self> {
        let store = Self {
            map,
            snapshot: SnapshotCell::new(),
        };
        store.snapshot.rebuild(store.map.as_ref())?;
        Ok(store)
    }

    /// Does an object with this digest exist and hash-check?
    pub fn has(&self, digest: &ObjectDigest) -> bool {
        self.lookup_sealed(digest).is_ok()
    }

    /// List every object digest currently known to the store
    pub fn list(&self) -> Vec<ObjectDigest> {
        self.snapshot.list()
    }

    /// Every `(userKey, digest)` pair currently in the store, reserved rows
    /// excluded. Unlike [`ObjectStore::list`], this surfaces the row's name
    /// as well as its digest — needed by callers that must rewrite each row
    /// in place (e.g. master-key rotation) rather than just enumerate what
    /// exists.
    pub fn entries(&self) -> Vec<(String, ObjectDigest)> {
        self.snapshot.entries()
    }

    /// Seal `plaintext` under `key` and store it under the expected
    /// `digest`. Fails with `HashMismatch` (no side effects) if the sealed
    /// bytes this call produces don't actually hash to `digest`.
    pub fn put(&self, key: &MasterKey, digest: &ObjectDigest, plaintext: &[u8]) -> Result<()> {
        let sealed = seal(key, plaintext)?;
        let actual = ObjectDigest::of_sealed(&sealed);
        if actual != *digest {
            return Err(StoreError::HashMismatch(digest.to_hex()));
        }
        self.store_sealed(digest, &sealed)
    }

    /// Seal `plaintext` under `key` and store it, returning the digest it
    /// was assigned. Convenience for callers that don't already know the
    /// digest in advance (e.g. a fresh local write).
    pub fn put_plaintext(&self, key: &MasterKey, plaintext: &[u8]) -> Result<ObjectDigest> {
        let sealed = seal(key, plaintext)?;
        let digest = ObjectDigest::of_sealed(&sealed);
        self.store_sealed(&digest, &sealed)?;
        Ok(digest)
    }

    /// Store an already-sealed blob directly, as a replication receiver
    /// does for incoming DATA frames. Returns an error if the sealed bytes
    /// do not hash to `digest`.
    pub fn put_sealed(&self, digest: &ObjectDigest, sealed: &[u8]) -> Result<()> {
        let actual = ObjectDigest::of_sealed(sealed);
        if actual != *digest {
            return Err(StoreError::HashMismatch(digest.to_hex()));
        }
        self.store_sealed(digest, sealed)
    }

    /// Store a plaintext blob under a human-readable application key rather
    /// than its digest-hex form, returning the digest it was assigned.
    pub fn put_named(&self, key: &MasterKey, user_key: &str, plaintext: &[u8]) -> Result<ObjectDigest> {
        let sealed = seal(key, plaintext)?;
        let digest = ObjectDigest::of_sealed(&sealed);
        self.map.upsert(user_key, &sealed)?;
        self.snapshot.learn(digest, user_key.to_string());
        Ok(digest)
    }

    /// Fetch and decrypt the object stored under a human-readable
    /// application key directly, without going through the digest index.
    /// This is what the top-level vault `get K` API uses: the caller
    /// already knows the key, so there is no digest to resolve first.
    pub fn get_named(&self, key: &MasterKey, user_key: &str) -> Result<Vec<u8>> {
        let sealed = self
            .map
            .get(user_key)?
            .ok_or_else(|| StoreError::NotFound(user_key.to_string()))?;
        let plaintext = open(key, &sealed)?;
        Ok(plaintext)
    }

    /// Does an application key exist directly in the underlying map? Unlike
    /// [`ObjectStore::has`], this does not go through the digest index.
    pub fn has_named(&self, user_key: &str) -> Result<bool> {
        Ok(self.map.get(user_key)?.is_some())
    }

    /// Fetch and decrypt the object named by `digest`
    pub fn get(&self, key: &MasterKey, digest: &ObjectDigest) -> Result<Vec<u8>> {
        let sealed = self.lookup_sealed(digest)?;
        let plaintext = open(key, &sealed)?;
        Ok(plaintext)
    }

    /// Fetch the sealed (still-encrypted) bytes for `digest`, as needed when
    /// serving objects to a replication peer that will verify them itself
    pub fn get_sealed(&self, digest: &ObjectDigest) -> Result<Vec<u8>> {
        self.lookup_sealed(digest)
    }

    /// A streaming writer for a single object: buffers plaintext in memory
    /// and seals + stores it on [`ObjectWriter::finish`].
    pub fn writer(&self) -> ObjectWriter<'_> {
        ObjectWriter {
            store: self,
            buf: Vec::new(),
        }
    }

    /// A reader over the decrypted bytes of an existing object
    pub fn reader(&self, key: &MasterKey, digest: &ObjectDigest) -> Result<ObjectReader> {
        let plaintext = self.get(key, digest)?;
        Ok(ObjectReader {
            cursor: io::Cursor::new(plaintext),
        })
    }

    fn lookup_sealed(&self, digest: &ObjectDigest) -> Result<Vec<u8>> {
        if let Some(user_key) = self.snapshot.key_for(digest) {
            match self.map.get(&user_key)? {
                Some(sealed) if ObjectDigest::of_sealed(&sealed) == *digest => return Ok(sealed),
                Some(_) => {
                    // The stored bytes no longer match the digest that
                    // named them (e.g. the underlying row was overwritten
                    // out from under us). Evict and fail closed.
                    self.snapshot.evict(digest);
                    return Err(StoreError::HashMismatch(digest.to_hex()));
                }
                None => {
                    self.snapshot.evict(digest);
                }
            }
        }

        // Fall back to the canonical digest-hex key directly, in case the
        // index hasn't been rebuilt since this object was ingested.
        let hex_key = digest.to_hex();
        match self.map.get(&hex_key)? {
            Some(sealed) if ObjectDigest::of_sealed(&sealed) == *digest => {
                self.snapshot.learn(*digest, hex_key);
                Ok(sealed)
            }
            Some(_) => Err(StoreError::HashMismatch(digest.to_hex())),
            None => Err(StoreError::NotFound(digest.to_hex())),
        }
    }

    fn store_sealed(&self, digest: &ObjectDigest, sealed: &[u8]) -> Result<()> {
        let hex_key = digest.to_hex();
        self.map.upsert(&hex_key, sealed)?;
        self.snapshot.learn(*digest, hex_key);
        Ok(())
    }

    /// Re-seal `plaintext` under `new_key` and write it back under the same
    /// identity the row already has, rather than appending a new one: a
    /// named row (`user_key` is an application key like `"k"`) is upserted
    /// back under that same `user_key`; a digest-keyed row (`user_key` is
    /// itself `old_digest.to_hex()`) moves to the new digest's hex key and
    /// the stale row under the old hex key is deleted. This is what
    /// master-key rotation uses to update each row in place (spec.md §7)
    /// instead of leaving the old-key bytes readable under their original
    /// name while a new, differently-keyed row accumulates alongside them.
    pub fn reseal_entry(
        &self,
        new_key: &MasterKey,
        user_key: &str,
        old_digest: &ObjectDigest,
        plaintext: &[u8],
    ) -> Result<ObjectDigest> {
        let sealed = seal(new_key, plaintext)?;
        let new_digest = ObjectDigest::of_sealed(&sealed);
        let is_digest_keyed = user_key == old_digest.to_hex();

        let index_key = if is_digest_keyed {
            let new_hex = new_digest.to_hex();
            self.map.upsert(&new_hex, &sealed)?;
            if new_hex != user_key {
                self.map.delete(user_key)?;
            }
            new_hex
        } else {
            self.map.upsert(user_key, &sealed)?;
            user_key.to_string()
        };

        self.snapshot.evict(old_digest);
        self.snapshot.learn(new_digest, index_key);

        Ok(new_digest)
    }

    /// Force a full rescan of the underlying blob map. Normally unnecessary
    /// — `put`/`put_named`/`put_sealed` keep the index current incrementally
    /// — but useful after the blob map has been mutated by something other
    /// than this store (e.g. a peer process sharing the same database).
    pub fn reindex(&self) -> Result<()> {
        self.snapshot.rebuild(self.map.as_ref())
    }
}

/// Streaming writer half of [`ObjectStore::writer`]. Holds a reference back
/// to its parent store so `finish` can seal and persist without the caller
/// having to thread the store through separately.
pub struct ObjectWriter<'a> {
    store: &'a ObjectStore,
    buf: Vec<u8>,
}

impl ObjectWriter<'_> {
    /// Append plaintext bytes to the object under construction
    pub fn write_chunk(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Seal and store the accumulated plaintext, returning its digest
    pub fn finish(self, key: &MasterKey) -> Result<ObjectDigest> {
        self.store.put_plaintext(key, &self.buf)
    }
}

impl io::Write for ObjectWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reader half of [`ObjectStore::reader`]: a plain `Read` over the
/// already-decrypted plaintext
pub struct ObjectReader {
    cursor: io::Cursor<Vec<u8>>,
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_map::SqliteBlobMap;

    fn store() -> ObjectStore {
        let map: Arc<dyn KeyedBlobMap> = Arc::new(SqliteBlobMap::open_in_memory().unwrap());
        ObjectStore::open(map).unwrap()
    }

    #[test]
    fn put_then_get_roundtrips() {
        let store = store();
        let key = MasterKey::generate();
        let digest = store.put_plaintext(&key, b"hello vault").unwrap();
        assert_eq!(store.get(&key, &digest).unwrap(), b"hello vault");
    }

    #[test]
    fn put_rejects_plaintext_not_matching_expected_digest() {
        let store = store();
        let key = MasterKey::generate();
        let real_digest = store.put_plaintext(&key, b"hello vault").unwrap();
        let err = store.put(&key, &real_digest, b"a different plaintext").unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch(_)));
    }

    #[test]
    fn has_reflects_presence() {
        let store = store();
        let key = MasterKey::generate();
        let digest = store.put_plaintext(&key, b"x").unwrap();
        assert!(store.has(&digest));

        let other = ObjectDigest::of_sealed(b"not stored");
        assert!(!store.has(&other));
    }

    #[test]
    fn get_with_wrong_key_fails_closed() {
        let store = store();
        let key_a = MasterKey::generate();
        let key_b = MasterKey::generate();
        let digest = store.put_plaintext(&key_a, b"secret").unwrap();
        assert!(store.get(&key_b, &digest).is_err());
    }

    #[test]
    fn get_missing_digest_is_not_found() {
        let store = store();
        let key = MasterKey::generate();
        let missing = ObjectDigest::of_sealed(b"never stored");
        let err = store.get(&key, &missing).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn put_sealed_rejects_mismatched_digest() {
        let store = store();
        let key = MasterKey::generate();
        let sealed = n1_seal::seal(&key, b"hi").unwrap();
        let wrong_digest = ObjectDigest::of_sealed(b"something else");
        let err = store.put_sealed(&wrong_digest, &sealed).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch(_)));
    }

    #[test]
    fn put_sealed_then_get_sealed_roundtrips() {
        let store = store();
        let key = MasterKey::generate();
        let sealed = n1_seal::seal(&key, b"hi").unwrap();
        let digest = ObjectDigest::of_sealed(&sealed);
        store.put_sealed(&digest, &sealed).unwrap();
        assert_eq!(store.get_sealed(&digest).unwrap(), sealed);
    }

    #[test]
    fn list_reflects_all_stored_objects() {
        let store = store();
        let key = MasterKey::generate();
        let d1 = store.put_plaintext(&key, b"one").unwrap();
        let d2 = store.put_plaintext(&key, b"two").unwrap();
        let mut listed = store.list();
        listed.sort();
        let mut expected = vec![d1, d2];
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[test]
    fn entries_includes_both_named_and_digest_keyed_rows() {
        let store = store();
        let key = MasterKey::generate();
        let named_digest = store.put_named(&key, "k", b"named value").unwrap();
        let bare_digest = store.put_plaintext(&key, b"bare value").unwrap();

        let mut entries = store.entries();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut expected = vec![("k".to_string(), named_digest), (bare_digest.to_hex(), bare_digest)];
        expected.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(entries, expected);
    }

    #[test]
    fn reseal_entry_keeps_a_named_row_under_the_same_user_key() {
        let store = store();
        let old_key = MasterKey::generate();
        let old_digest = store.put_named(&old_key, "k", b"hello").unwrap();

        let new_key = MasterKey::generate();
        let new_digest = store.reseal_entry(&new_key, "k", &old_digest, b"hello").unwrap();

        assert_ne!(new_digest, old_digest);
        assert_eq!(store.get_named(&new_key, "k").unwrap(), b"hello");
        assert!(store.get_named(&old_key, "k").is_err());
    }

    #[test]
    fn reseal_entry_moves_a_digest_keyed_row_to_its_new_hex_name() {
        let store = store();
        let old_key = MasterKey::generate();
        let old_digest = store.put_plaintext(&old_key, b"anonymous").unwrap();

        let new_key = MasterKey::generate();
        let new_digest = store
            .reseal_entry(&new_key, &old_digest.to_hex(), &old_digest, b"anonymous")
            .unwrap();

        assert_ne!(new_digest, old_digest);
        assert_eq!(store.get(&new_key, &new_digest).unwrap(), b"anonymous");
        assert!(!store.has(&old_digest));
        assert_eq!(store.list(), vec![new_digest]);
    }

    #[test]
    fn writer_roundtrips_like_put() {
        let store = store();
        let key = MasterKey::generate();
        let mut writer = store.writer();
        writer.write_chunk(b"chunk one ");
        writer.write_chunk(b"chunk two");
        let digest = writer.finish(&key).unwrap();
        assert_eq!(store.get(&key, &digest).unwrap(), b"chunk one chunk two");
    }

    #[test]
    fn reader_yields_decrypted_bytes() {
        use std::io::Read as _;
        let store = store();
        let key = MasterKey::generate();
        let digest = store.put_plaintext(&key, b"read me").unwrap();
        let mut reader = store.reader(&key, &digest).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"read me");
    }

    #[test]
    fn named_put_is_addressable_by_digest() {
        let store = store();
        let key = MasterKey::generate();
        let digest = store.put_named(&key, "my-app-key", b"value").unwrap();
        assert_eq!(store.get(&key, &digest).unwrap(), b"value");
    }

    #[test]
    fn named_put_then_get_named_roundtrips() {
        let store = store();
        let key = MasterKey::generate();
        store.put_named(&key, "greeting", b"hello vault").unwrap();
        assert_eq!(store.get_named(&key, "greeting").unwrap(), b"hello vault");
        assert!(store.has_named("greeting").unwrap());
        assert!(!store.has_named("nonexistent").unwrap());
    }

    #[test]
    fn get_named_missing_key_is_not_found() {
        let store = store();
        let key = MasterKey::generate();
        let err = store.get_named(&key, "nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn reopening_over_same_map_rebuilds_index() {
        let map: Arc<dyn KeyedBlobMap> = Arc::new(SqliteBlobMap::open_in_memory().unwrap());
        let key = MasterKey::generate();
        let digest = {
            let store = ObjectStore::open(Arc::clone(&map)).unwrap();
            store.put_plaintext(&key, b"persisted").unwrap()
        };
        let reopened = ObjectStore::open(map).unwrap();
        assert_eq!(reopened.get(&key, &digest).unwrap(), b"persisted");
    }
}

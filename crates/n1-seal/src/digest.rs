//! Object identity: SHA-256 of the *sealed* form.

use sha2::{Digest as _, Sha256};

/// Length in bytes of a digest
pub const DIGEST_LEN: usize = 32;

/// A 32-byte SHA-256 digest of a sealed blob. This is the system's object
/// identity — it is computed from what is transmitted on the wire, not from
/// the plaintext, so a receiver can verify it without knowing the sender's
/// key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectDigest([u8; DIGEST_LEN]);

impl ObjectDigest {
    /// Hash a sealed blob to produce its digest
    pub fn of_sealed(sealed: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sealed);
        let out = hasher.finalize();
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&out);
        Self(bytes)
    }

    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Hex-encode the digest (this is also the canonical userKey for
    /// objects ingested during replication, see n1-store)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a digest from a hex string. Returns `None` unless the input is
    /// exactly 64 lowercase hex characters decoding to 32 bytes.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != DIGEST_LEN * 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let raw = hex::decode(s).ok()?;
        let bytes: [u8; DIGEST_LEN] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl std::fmt::Debug for ObjectDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectDigest({})", self.to_hex())
    }
}

impl std::fmt::Display for ObjectDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

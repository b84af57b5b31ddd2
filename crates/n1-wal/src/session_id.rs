//! Transfer session identity: a 32-byte value unique per connection.

/// Length in bytes of a session id
pub const SESSION_ID_LEN: usize = 32;

/// A 32-byte session identifier. Generated fresh per session with a
/// cryptographically secure RNG — reused or predictable values would
/// silently conflate unrelated sessions' WAL records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    /// Generate a fresh random session id
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; SESSION_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw session id bytes, e.g. as received over the wire
    pub fn from_bytes(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw session id bytes
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }

    /// Hex-encode the session id, used as its primary-key form in the WAL
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId({})", self.to_hex())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_ids() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_roundtrips_through_bytes() {
        let id = SessionId::generate();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
    }
}

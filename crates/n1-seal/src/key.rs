//! The per-vault master key

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of a master key
pub const MASTER_KEY_LEN: usize = 32;

/// A 32-byte opaque secret owned by the host secret store.
///
/// The core only ever borrows this for the lifetime of a session; it never
/// persists it itself. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_LEN]);

impl MasterKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random master key
    pub fn generate() -> Self {
        use ring::rand::{SecureRandom, SystemRandom};
        let rng = SystemRandom::new();
        let mut bytes = [0u8; MASTER_KEY_LEN];
        rng.fill(&mut bytes).expect("system RNG failure");
        Self(bytes)
    }

    /// Borrow the raw key bytes
    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_keys() {
        let a = MasterKey::generate();
        let b = MasterKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let k = MasterKey::from_bytes([0x42; 32]);
        let s = format!("{:?}", k);
        assert!(!s.contains("42"));
    }
}

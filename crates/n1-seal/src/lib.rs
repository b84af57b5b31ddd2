//! # n1 Seal
//!
//! Authenticated encryption of individual vault blobs with a 256-bit master
//! key. Sealed form = 12-byte random nonce ‖ AES-256-GCM ciphertext ‖
//! 16-byte tag, with empty associated data. This is the base layer the rest
//! of n1 builds on: `n1-store`'s object identity is the SHA-256 digest of
//! the sealed form produced here, never of the plaintext.

pub mod digest;
pub mod error;
pub mod key;
pub mod seal;

pub use digest::ObjectDigest;
pub use error::{Result, SealError};
pub use key::MasterKey;
pub use seal::{open, seal, MIN_SEALED_LEN, NONCE_LEN, TAG_LEN};

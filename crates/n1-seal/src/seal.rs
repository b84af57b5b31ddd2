//! AES-256-GCM sealing: nonce ‖ ciphertext ‖ tag.
//!
//! Each call to [`seal`] draws a fresh random 96-bit nonce and is safe to use
//! repeatedly with the same key under a rekey-per-vault discipline (see
//! `Vault::rotate_key` in `n1-node`): nonce collision probability stays
//! negligible for the number of blobs a single vault is expected to hold
//! between rotations.

use ring::aead::{self, BoundKey, LessSafeKey, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, SealError};
use crate::key::MasterKey;

/// Nonce length in bytes (96 bits)
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;
/// Minimum length of any sealed form that can possibly decrypt
pub const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

fn less_safe_key(key: &MasterKey) -> LessSafeKey {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .expect("AES-256-GCM key is exactly 32 bytes");
    LessSafeKey::new(unbound)
}

/// Seal a plaintext blob: generates a fresh random nonce and returns
/// `nonce ‖ AES-256-GCM(key, nonce, plaintext)` with empty associated data.
/// Empty plaintext is legal and produces a 28-byte output.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| SealError::RngFailure)?;

    let less_safe_key = less_safe_key(key);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = Vec::with_capacity(plaintext.len() + TAG_LEN);
    in_out.extend_from_slice(plaintext);

    less_safe_key
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .expect("sealing at most a few MiB never fails");

    let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

/// Open a sealed blob produced by [`seal`]. Fails closed: any tag mismatch
/// or undersized input is rejected, never silently returning mismatched
/// data.
pub fn open(key: &MasterKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(SealError::InvalidCiphertext);
    }

    let (nonce_bytes, rest) = sealed.split_at(NONCE_LEN);
    let nonce = aead::Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| SealError::InvalidCiphertext)?;

    let less_safe_key = less_safe_key(key);
    let mut in_out = rest.to_vec();
    let plaintext = less_safe_key
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| SealError::AuthFail)?;

    Ok(plaintext.to_vec())
}

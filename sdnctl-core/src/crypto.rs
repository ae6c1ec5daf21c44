//! Password hashing primitives
//!
//! The derivation parameters below are shared with the offline credential
//! generator; a credential file written by one side must verify on the
//! other, so none of them may change independently.

use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// PBKDF2 iteration count
pub const KDF_ITERATIONS: u32 = 100_000;

/// Derived key length in bytes (one SHA-256 block)
pub const HASH_LEN: usize = 32;

/// Random bytes behind a generated salt
pub const SALT_BYTES: usize = 16;

static KDF_ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

const KDF_ROUNDS: NonZeroU32 = match NonZeroU32::new(KDF_ITERATIONS) {
    Some(rounds) => rounds,
    None => panic!("KDF_ITERATIONS must be non-zero"),
};

/// Derive the comparable hash of `password` with PBKDF2-HMAC-SHA256
pub fn derive_password_hash(password: &str, salt: &[u8]) -> Zeroizing<[u8; HASH_LEN]> {
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    pbkdf2::derive(KDF_ALGORITHM, KDF_ROUNDS, salt, password.as_bytes(), &mut out[..]);
    out
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Slices of different lengths compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Generate a printable random salt suitable for a credential file
pub fn generate_salt() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; SALT_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| Error::Internal("System random source unavailable".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

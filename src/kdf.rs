//! Password-based key derivation
//!
//! PBKDF2 with HMAC-SHA-256 turns a password and per-container salt into a
//! fixed-size symmetric key. Derivation is deterministic: decryption
//! recomputes the same key from the salt stored in the container.

use hmac::Hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptpackError, ErrorCategory, ErrorKind, Result};

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Derive `key_len` bytes of key material from a password and salt.
///
/// Fails with a `KeyDerivationFailure` if the parameters are unusable or the
/// underlying primitive reports failure; never returns a zero or truncated
/// key. The returned buffer is wiped when dropped.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if iterations == 0 {
        return Err(CryptpackError::with_kind(
            ErrorCategory::User,
            ErrorKind::KeyDerivationFailure,
            "iteration count must be at least 1",
        ));
    }
    if key_len == 0 {
        return Err(CryptpackError::with_kind(
            ErrorCategory::User,
            ErrorKind::KeyDerivationFailure,
            "derived key length must be at least 1 byte",
        ));
    }

    let mut key = Zeroizing::new(vec![0u8; key_len]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut key).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivationFailure,
            "PBKDF2 key derivation failed",
            e,
        )
    })?;

    Ok(key)
}

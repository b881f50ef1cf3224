//! The on-disk container layout
//!
//! The binary format is pure concatenation, no magic number, no version
//! field:
//!
//! - salt: 16 bytes (random, feeds key derivation)
//! - IV: 16 bytes (random, seeds the CBC chain)
//! - ciphertext: variable length (AES-256-CBC, padded)
//!
//! Any structural change to this layout is a breaking change.

use crate::cipher::IV_LEN;
use crate::error::{CryptpackError, ErrorCategory, ErrorKind, Result};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Fixed prefix covering salt and IV
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN;

/// Pack salt, IV, and ciphertext into the container byte sequence.
pub fn pack(salt: &[u8; SALT_LEN], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut container = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    container.extend_from_slice(salt);
    container.extend_from_slice(iv);
    container.extend_from_slice(ciphertext);
    container
}

/// Split a container into (salt, IV, ciphertext).
///
/// Fails with `MalformedContainer` if the input cannot hold the fixed
/// header; the split itself is deterministic at byte offsets 16 and 32.
pub fn unpack(container: &[u8]) -> Result<([u8; SALT_LEN], [u8; IV_LEN], &[u8])> {
    if container.len() < HEADER_LEN {
        return Err(CryptpackError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedContainer,
            format!(
                "container is {} bytes; the salt and IV header alone is {} bytes - likely truncated",
                container.len(),
                HEADER_LEN
            ),
        ));
    }

    let salt: [u8; SALT_LEN] = container[..SALT_LEN].try_into().map_err(|_| {
        CryptpackError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "failed to read salt",
        )
    })?;
    let iv: [u8; IV_LEN] = container[SALT_LEN..HEADER_LEN].try_into().map_err(|_| {
        CryptpackError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "failed to read IV",
        )
    })?;

    Ok((salt, iv, &container[HEADER_LEN..]))
}

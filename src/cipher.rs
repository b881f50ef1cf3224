//! AES-256-CBC block cipher operations
//!
//! Encryption applies PKCS#7 padding so any plaintext length is accepted.
//! Decryption deliberately leaves padding removal disabled and returns the
//! raw decrypted blocks: the pipeline's end-of-data marker, not the padding,
//! is the integrity signal, and the caller discards trailing bytes after
//! locating it.
//!
//! Each call constructs a fresh cipher value and consumes it before
//! returning; no cipher state survives between calls.

use aes::Aes256;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{CryptpackError, ErrorCategory, ErrorKind, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block length in bytes
pub const BLOCK_LEN: usize = 16;

/// Length of the initialization vector in bytes (one AES block)
pub const IV_LEN: usize = 16;

fn key_array(key: &[u8]) -> Result<&[u8; 32]> {
    key.try_into().map_err(|_| {
        CryptpackError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::CipherFailure,
            format!("cipher key must be 32 bytes, got {}", key.len()),
        )
    })
}

/// Encrypt `plaintext` under `key`/`iv`.
///
/// Output length is the plaintext length rounded up to the next 16-byte
/// boundary (PKCS#7; a full padding block is added to block-aligned input).
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    let key = key_array(key)?;
    let padded_len = (plaintext.len() / BLOCK_LEN + 1) * BLOCK_LEN;

    let mut buf = vec![0u8; padded_len];
    buf[..plaintext.len()].copy_from_slice(plaintext);

    let encryptor = Aes256CbcEnc::new(key.into(), iv.into());
    let written = encryptor
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .map_err(|_| {
            CryptpackError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::CipherFailure,
                "block encryption failed",
            )
        })?
        .len();
    debug_assert_eq!(written, padded_len);
    buf.truncate(written);

    Ok(buf)
}

/// Decrypt `ciphertext` under `key`/`iv`, returning exactly
/// `ciphertext.len()` bytes of raw block data (no padding removal).
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    let key = key_array(key)?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptpackError::with_kind(
            ErrorCategory::User,
            ErrorKind::CipherFailure,
            format!(
                "ciphertext length {} is not a positive multiple of the {}-byte block size",
                ciphertext.len(),
                BLOCK_LEN
            ),
        ));
    }

    let mut buf = ciphertext.to_vec();
    let decryptor = Aes256CbcDec::new(key.into(), iv.into());
    let written = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| {
            CryptpackError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::CipherFailure,
                "block decryption failed",
            )
        })?
        .len();
    buf.truncate(written);

    Ok(buf)
}

//! Pipeline orchestration
//!
//! Encryption runs archive -> key derivation -> cipher -> container and
//! writes the container file; decryption runs the exact inverse and hands
//! the extracted tree to the directory normalizer. Each operation is one
//! linear pass with no shared mutable state besides the immutable
//! [`PipelineConfig`], and secret-bearing buffers (password, derived key)
//! live in `Zeroizing` wrappers so they are wiped on every exit path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::RngCore;
use rand::rngs::OsRng;

use crate::archive;
use crate::cipher::{self, IV_LEN};
use crate::container::{self, SALT_LEN};
use crate::error::{CryptpackError, ErrorCategory, ErrorKind, Result};
use crate::kdf::{self, DEFAULT_ITERATIONS, KEY_LEN};
use crate::normalize;
use crate::password::PasswordReader;

/// Marker appended to the archive bytes before encryption. Its presence
/// after decryption is the (weak) signal that the password was right and
/// the container intact; there is no cryptographic authentication tag.
const END_MARKER: &[u8] = b"::END::";

/// Immutable per-run configuration, fixed before the pipeline starts.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// PBKDF2 iteration count.
    pub iterations: u32,
    /// Derived key length in bytes; AES-256 requires 32.
    pub key_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            key_len: KEY_LEN,
        }
    }
}

/// The container file an encryption run will produce:
/// `<output><original-extension>.enc`.
pub fn container_path(input: &Path, output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    name.push(".enc");
    PathBuf::from(name)
}

fn fresh_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::RandomFailure,
            "OS random source failed",
            e,
        )
    })?;
    Ok(bytes)
}

fn require_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(CryptpackError::with_kind(
            ErrorCategory::User,
            ErrorKind::InputNotFound,
            format!("input does not exist: {}", path.display()),
        ))
    }
}

/// Write the container atomically: tempfile in the target directory,
/// flush + fsync, then rename into place. A failure on any step drops the
/// tempfile, so no partial container is ever left behind.
fn write_container(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;
    temp.write_all(contents).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    temp.flush().map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp.as_file().sync_all().map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;
    temp.persist(path).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Encrypt a file or directory into a password-protected container.
///
/// Returns the path of the written container,
/// `<output><original-extension>.enc`. If that path already exists the
/// caller decides overwrite policy before invoking this; the write itself
/// replaces atomically.
pub fn encrypt_path(
    input: &Path,
    output: &Path,
    password: &mut dyn PasswordReader,
    config: &PipelineConfig,
) -> Result<PathBuf> {
    require_exists(input)?;

    let mut payload = archive::pack(input)?;
    payload.extend_from_slice(END_MARKER);

    let salt: [u8; SALT_LEN] = fresh_bytes()?;
    let iv: [u8; IV_LEN] = fresh_bytes()?;

    let password = password.read_password()?;
    let key = kdf::derive_key(&password, &salt, config.iterations, config.key_len)?;
    let ciphertext = cipher::encrypt(&payload, &key, &iv)
        .map_err(|e| e.with_context("encryption failed"))?;

    let container = container::pack(&salt, &iv, &ciphertext);
    let target = container_path(input, output);
    write_container(&target, &container)
        .map_err(|e| e.with_context(format!("failed to write to {}", target.display())))?;

    Ok(target)
}

/// Decrypt a container into a directory tree at `output_dir`.
///
/// The output is always a directory (created if absent); an originally
/// single-file input appears as its sole child.
pub fn decrypt_path(
    input: &Path,
    output_dir: &Path,
    password: &mut dyn PasswordReader,
    config: &PipelineConfig,
) -> Result<()> {
    require_exists(input)?;

    let data = fs::read(input).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to read from {}", input.display()),
            e,
        )
    })?;
    let (salt, iv, ciphertext) = container::unpack(&data)?;

    let password = password.read_password()?;
    let key = kdf::derive_key(&password, &salt, config.iterations, config.key_len)?;
    let payload = cipher::decrypt(ciphertext, &key, &iv)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    let end = payload
        .windows(END_MARKER.len())
        .position(|window| window == END_MARKER)
        .ok_or_else(|| {
            CryptpackError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "decryption verification failed - wrong password or corrupted container",
            )
        })?;

    archive::unpack(&payload[..end], output_dir)
        .map_err(|e| e.with_context("failed to extract archive"))?;
    normalize::collapse_redundant_root(output_dir)?;

    Ok(())
}

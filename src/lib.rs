//! cryptpack - password-based encryption of files and directories
//!
//! A file or directory is packed into a single archive blob, sealed with a
//! key derived from a password (PBKDF2-HMAC-SHA256), and written out as one
//! binary container: `salt(16) || iv(16) || AES-256-CBC ciphertext`.
//! Decryption reverses the pipeline and normalizes the extracted directory
//! structure.
//!
//! The container carries no authentication tag; a fixed end-of-data marker
//! inside the encrypted payload detects wrong passwords and gross
//! corruption, but does not protect against deliberate tampering.

pub mod archive;
pub mod cipher;
pub mod container;
pub mod error;
pub mod kdf;
pub mod normalize;
pub mod password;
pub mod pipeline;

pub use error::{CryptpackError, ErrorCategory, ErrorKind, Result};
pub use pipeline::{PipelineConfig, container_path, decrypt_path, encrypt_path};

//! Password acquisition
//!
//! The pipeline never reads the password itself; callers hand it a
//! [`PasswordReader`] so tests, stdin piping, and interactive terminal
//! entry all go through the same seam.

use crate::error::{CryptpackError, ErrorCategory, ErrorKind, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading passwords from various sources
pub trait PasswordReader {
    /// Read a password as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the password wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed password (for testing)
pub struct ConstantPasswordReader {
    password: Zeroizing<Vec<u8>>,
}

impl ConstantPasswordReader {
    pub fn new(password: Vec<u8>) -> Self {
        Self {
            password: Zeroizing::new(password),
        }
    }
}

impl PasswordReader for ConstantPasswordReader {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.password).clone()))
    }
}

/// Reads a password from any io::Read source
pub struct ReaderPasswordReader {
    reader: Box<dyn Read>,
}

impl ReaderPasswordReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PasswordReader for ReaderPasswordReader {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            CryptpackError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading password: {}", e),
                e,
            )
        })?;
        // Trailing newline is an artifact of `echo secret | cryptpack ...`,
        // not part of the password.
        while data.last() == Some(&b'\n') || data.last() == Some(&b'\r') {
            data.pop();
        }
        Ok(data)
    }
}

/// Reads a password from the terminal with no echo
pub struct TerminalPasswordReader;

impl TerminalPasswordReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPasswordReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordReader for TerminalPasswordReader {
    /// Read password from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library
    /// constraints. For non-UTF-8 passwords, use --password-stdin instead.
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(CryptpackError::with_kind(
                ErrorCategory::User,
                ErrorKind::PasswordUnavailable,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        io::stderr().write_all(b"Password: ").map_err(|e| {
            CryptpackError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write prompt: {}", e),
                e,
            )
        })?;
        io::stderr().flush().map_err(|e| {
            CryptpackError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        // Read password *without echo*
        // Note: rpassword returns String (UTF-8 only), not zeroized
        let password = rpassword::read_password().map_err(|e| {
            CryptpackError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PasswordUnavailable,
                format!("failure reading password: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(password.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_reader() {
        let mut reader = ConstantPasswordReader::new(b"pw123".to_vec());
        assert_eq!(&*reader.read_password().unwrap(), b"pw123");
        assert_eq!(&*reader.read_password().unwrap(), b"pw123");
    }

    #[test]
    fn test_reader_password_reader() {
        let data = b"mypassword";
        let mut reader = ReaderPasswordReader::new(Box::new(&data[..]));
        assert_eq!(&*reader.read_password().unwrap(), b"mypassword");
    }

    #[test]
    fn test_reader_password_reader_empty() {
        let data = b"";
        let mut reader = ReaderPasswordReader::new(Box::new(&data[..]));
        assert_eq!(&*reader.read_password().unwrap(), b"");
    }

    #[test]
    fn test_reader_strips_trailing_newline() {
        let data = b"secret\n";
        let mut reader = ReaderPasswordReader::new(Box::new(&data[..]));
        assert_eq!(&*reader.read_password().unwrap(), b"secret");

        let data = b"secret\r\n";
        let mut reader = ReaderPasswordReader::new(Box::new(&data[..]));
        assert_eq!(&*reader.read_password().unwrap(), b"secret");
    }

    /// Verifies that ReaderPasswordReader accepts arbitrary byte sequences,
    /// not just valid UTF-8. This enables --password-stdin to work with
    /// passwords containing non-UTF-8 bytes.
    #[test]
    fn test_reader_password_reader_non_utf8() {
        let data: &[u8] = &[0xff, 0xfe, 0x00, 0x01];
        let mut reader = ReaderPasswordReader::new(Box::new(data));
        assert_eq!(&*reader.read_password().unwrap(), data);
    }
}

//! Archive packing and unpacking
//!
//! A file or directory tree becomes a single in-memory ZIP blob so the
//! cipher layer only ever sees one byte buffer. A single file is stored
//! under its base name; a directory is walked recursively and stored under
//! a relative path rooted at the directory's own name, with directory
//! entries (including empty directories) written before file entries.
//!
//! Unpacking recovers per entry: an unreadable or unwritable entry is
//! skipped with a warning, and entry paths that would escape the
//! destination are refused outright. Only failure to open or create the
//! archive itself aborts the operation.

use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{CryptpackError, ErrorCategory, ErrorKind, Result};

fn archive_error(msg: impl Into<String>, source: zip::result::ZipError) -> CryptpackError {
    CryptpackError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::ArchiveFailure,
        msg,
        source,
    )
}

/// Forward-slash entry name for a path relative to the archive root.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Pack `source` (a file or a directory) into an archive byte blob.
pub fn pack(source: &Path) -> Result<Vec<u8>> {
    let metadata = fs::metadata(source).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::InputNotFound,
            format!("cannot read input {}", source.display()),
            e,
        )
    })?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    if metadata.is_file() {
        pack_file(&mut writer, options, source)?;
    } else if metadata.is_dir() {
        pack_tree(&mut writer, options, source)?;
    } else {
        return Err(CryptpackError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArchiveFailure,
            format!("{} is neither a file nor a directory", source.display()),
        ));
    }

    let cursor = writer
        .finish()
        .map_err(|e| archive_error("failed to finalize archive", e))?;
    Ok(cursor.into_inner())
}

/// A single file becomes a one-entry archive named by its base name;
/// directory components of the input path are stripped.
fn pack_file(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    source: &Path,
) -> Result<()> {
    let name = source
        .file_name()
        .ok_or_else(|| {
            CryptpackError::with_kind(
                ErrorCategory::User,
                ErrorKind::ArchiveFailure,
                format!("{} has no file name component", source.display()),
            )
        })?
        .to_string_lossy()
        .into_owned();

    let contents = fs::read(source).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArchiveFailure,
            format!("failed to read {}", source.display()),
            e,
        )
    })?;

    writer
        .start_file(name, options)
        .map_err(|e| archive_error("failed to add archive entry", e))?;
    writer.write_all(&contents).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::ArchiveFailure,
            "failed to write archive entry",
            e,
        )
    })?;
    Ok(())
}

fn pack_tree(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    source: &Path,
) -> Result<()> {
    let root_name = source
        .file_name()
        .ok_or_else(|| {
            CryptpackError::with_kind(
                ErrorCategory::User,
                ErrorKind::ArchiveFailure,
                format!("{} has no directory name component", source.display()),
            )
        })?
        .to_string_lossy()
        .into_owned();

    // The walk yields parents before children, so the collected directory
    // list is already in creation order.
    let mut directories = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(source) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable directory entry: {}", e);
                continue;
            }
        };
        let rel = match entry.path().strip_prefix(source) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let name = if rel.as_os_str().is_empty() {
            root_name.clone()
        } else {
            format!("{}/{}", root_name, entry_name(rel))
        };

        if entry.file_type().is_dir() {
            directories.push(name);
        } else if entry.file_type().is_file() {
            files.push((name, entry.into_path()));
        } else {
            tracing::warn!("skipping {}: not a regular file", entry.path().display());
        }
    }

    for name in directories {
        writer
            .add_directory(name, options)
            .map_err(|e| archive_error("failed to add directory entry", e))?;
    }

    for (name, path) in files {
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("skipping unreadable file {}: {}", path.display(), e);
                continue;
            }
        };
        writer
            .start_file(name, options)
            .map_err(|e| archive_error("failed to add archive entry", e))?;
        writer.write_all(&contents).map_err(|e| {
            CryptpackError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::ArchiveFailure,
                format!("failed to write archive entry for {}", path.display()),
                e,
            )
        })?;
    }

    Ok(())
}

/// Unpack an archive blob into `dest`, creating it if absent.
pub fn unpack(archive: &[u8], dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| {
        CryptpackError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create destination {}", dest.display()),
            e,
        )
    })?;

    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| archive_error("failed to open archive", e))?;

    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable archive entry {}: {}", index, e);
                continue;
            }
        };

        // Reject `..` segments, absolute paths, and anything else that
        // would land outside the destination.
        let rel = match entry.enclosed_name() {
            Some(rel) => rel,
            None => {
                let err = CryptpackError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::UnsafeArchiveEntry,
                    format!("refusing path-escaping archive entry {:?}", entry.name()),
                );
                tracing::warn!("{}", err);
                continue;
            }
        };
        let target = dest.join(rel);

        if entry.is_dir() {
            if let Err(e) = fs::create_dir_all(&target) {
                tracing::warn!("failed to create directory {}: {}", target.display(), e);
            }
            continue;
        }

        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!("failed to create parent of {}: {}", target.display(), e);
                continue;
            }
        }
        let mut out = match File::create(&target) {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!("failed to create {}: {}", target.display(), e);
                continue;
            }
        };
        if let Err(e) = io::copy(&mut entry, &mut out) {
            tracing::warn!("failed to extract {}: {}", target.display(), e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_single_file_uses_base_name() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("some").join("deep");
        fs::create_dir_all(&nested).unwrap();
        let input = nested.join("note.txt");
        fs::write(&input, b"hello").unwrap();

        let blob = pack(&input).unwrap();

        let mut zip = ZipArchive::new(Cursor::new(&blob[..])).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        assert_eq!(entry.name(), "note.txt");
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"hello");
    }

    #[test]
    fn test_file_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("data.bin");
        fs::write(&input, [0u8, 1, 2, 255]).unwrap();

        let blob = pack(&input).unwrap();
        let dest = tmp.path().join("out");
        unpack(&blob, &dest).unwrap();

        assert_eq!(fs::read(dest.join("data.bin")).unwrap(), [0u8, 1, 2, 255]);
    }

    #[test]
    fn test_directory_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("proj");
        fs::create_dir_all(root.join("sub/inner")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("sub/b.txt"), b"").unwrap(); // zero-byte file
        fs::write(root.join("sub/inner/c.txt"), b"gamma").unwrap();

        let blob = pack(&root).unwrap();
        let dest = tmp.path().join("out");
        unpack(&blob, &dest).unwrap();

        assert_eq!(fs::read(dest.join("proj/a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.join("proj/sub/b.txt")).unwrap(), b"");
        assert_eq!(fs::read(dest.join("proj/sub/inner/c.txt")).unwrap(), b"gamma");
        assert!(dest.join("proj/empty").is_dir());
    }

    #[test]
    fn test_empty_directory_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("vacant");
        fs::create_dir(&root).unwrap();

        let blob = pack(&root).unwrap();
        let dest = tmp.path().join("out");
        unpack(&blob, &dest).unwrap();

        assert!(dest.join("vacant").is_dir());
        assert_eq!(fs::read_dir(dest.join("vacant")).unwrap().count(), 0);
    }

    #[test]
    fn test_directory_entries_precede_file_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("tree");
        fs::create_dir_all(root.join("x/y")).unwrap();
        fs::write(root.join("top.txt"), b"1").unwrap();
        fs::write(root.join("x/mid.txt"), b"2").unwrap();
        fs::write(root.join("x/y/leaf.txt"), b"3").unwrap();

        let blob = pack(&root).unwrap();
        let mut zip = ZipArchive::new(Cursor::new(&blob[..])).unwrap();

        let mut seen_file = false;
        for index in 0..zip.len() {
            let entry = zip.by_index(index).unwrap();
            if entry.is_dir() {
                assert!(!seen_file, "directory entry {} after a file entry", entry.name());
            } else {
                seen_file = true;
            }
        }
        assert!(seen_file);
    }

    #[test]
    fn test_path_traversal_entry_skipped() {
        // Hand-craft an archive whose entry tries to climb out of the
        // destination directory.
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("../evil.txt", options).unwrap();
        writer.write_all(b"escape").unwrap();
        writer.start_file("fine.txt", options).unwrap();
        writer.write_all(b"ok").unwrap();
        let blob = writer.finish().unwrap().into_inner();

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out");
        unpack(&blob, &dest).unwrap();

        assert!(!tmp.path().join("evil.txt").exists());
        assert!(!dest.join("evil.txt").exists());
        // The benign sibling entry is still extracted.
        assert_eq!(fs::read(dest.join("fine.txt")).unwrap(), b"ok");
    }

    #[test]
    fn test_unpack_creates_destination() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("f.txt");
        fs::write(&input, b"x").unwrap();
        let blob = pack(&input).unwrap();

        let dest = tmp.path().join("a/b/c");
        unpack(&blob, &dest).unwrap();
        assert!(dest.join("f.txt").exists());
    }

    #[test]
    fn test_missing_input_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = pack(&tmp.path().join("absent")).expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::InputNotFound));
    }

    #[test]
    fn test_garbage_archive_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = unpack(b"definitely not a zip", &tmp.path().join("out"))
            .expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::ArchiveFailure));
    }
}

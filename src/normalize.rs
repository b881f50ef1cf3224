//! Post-extraction directory normalization
//!
//! Archiving and re-extracting can leave the payload wrapped in redundant
//! parent folders that exist only because of archive entry naming. This
//! module walks down any chain of single-child directories, lifts the
//! contents of the deepest such directory into the extraction root, and
//! removes the emptied chain. A directory with several entries, or with a
//! file among its children, is left untouched.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CryptpackError, ErrorCategory, ErrorKind, Result};

fn fs_error(msg: impl Into<String>, source: std::io::Error) -> CryptpackError {
    CryptpackError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, source)
}

/// Walk down while the current directory holds exactly one entry and that
/// entry is a directory. The walk is bounded by filesystem depth.
fn deepest_redundant_root(extract_dir: &Path) -> Result<PathBuf> {
    let mut current = extract_dir.to_path_buf();
    loop {
        let mut sole_child: Option<PathBuf> = None;
        let mut entries = 0usize;
        for entry in fs::read_dir(&current)
            .map_err(|e| fs_error(format!("failed to list {}", current.display()), e))?
        {
            let entry = entry
                .map_err(|e| fs_error(format!("failed to list {}", current.display()), e))?;
            entries += 1;
            if entries == 1 && entry.path().is_dir() {
                sole_child = Some(entry.path());
            }
        }

        match (entries, sole_child) {
            (1, Some(child)) => current = child,
            _ => return Ok(current),
        }
    }
}

/// Collapse redundant single-child directory nesting under `extract_dir`.
///
/// No-op when `extract_dir` itself is the deepest root, which makes the
/// operation idempotent.
pub fn collapse_redundant_root(extract_dir: &Path) -> Result<()> {
    let root = deepest_redundant_root(extract_dir)?;
    if root == extract_dir {
        return Ok(());
    }
    tracing::debug!(
        "collapsing redundant nesting: {} -> {}",
        root.display(),
        extract_dir.display()
    );

    for entry in
        fs::read_dir(&root).map_err(|e| fs_error(format!("failed to list {}", root.display()), e))?
    {
        let entry =
            entry.map_err(|e| fs_error(format!("failed to list {}", root.display()), e))?;
        let target = extract_dir.join(entry.file_name());
        fs::rename(entry.path(), &target).map_err(|e| {
            fs_error(
                format!(
                    "failed to move {} to {}",
                    entry.path().display(),
                    target.display()
                ),
                e,
            )
        })?;
    }

    // Remove the emptied chain from the root upward, stopping at the first
    // non-empty directory or at the extraction root itself.
    let mut dir = root;
    while dir != extract_dir {
        let is_empty = fs::read_dir(&dir)
            .map_err(|e| fs_error(format!("failed to list {}", dir.display()), e))?
            .next()
            .is_none();
        if !is_empty {
            break;
        }
        fs::remove_dir(&dir)
            .map_err(|e| fs_error(format!("failed to remove {}", dir.display()), e))?;
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }

    Ok(())
}

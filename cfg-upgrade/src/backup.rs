//! Whole-file and whole-directory copies taken before files are rewritten.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("{} does not exist", .0.display())]
    FileNotFound(PathBuf),
    #[error("{} and {} overlap", .from.display(), .to.display())]
    Overlap { from: PathBuf, to: PathBuf },
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Copy `source` (a file or a directory tree) to `backup`, replacing any
/// previous backup at that location.
pub fn backup(source: &Path, backup: &Path) -> Result<(), BackupError> {
    replace_subtree(source, backup)?;
    debug!(source = %source.display(), backup = %backup.display(), "backup taken");
    Ok(())
}

/// Put a backup back in place. Only `target` itself is replaced; its
/// siblings are left alone and a missing target is created.
pub fn restore(backup: &Path, target: &Path) -> Result<(), BackupError> {
    replace_subtree(backup, target)?;
    debug!(backup = %backup.display(), target = %target.display(), "backup restored");
    Ok(())
}

fn replace_subtree(from: &Path, to: &Path) -> Result<(), BackupError> {
    if !from.exists() {
        return Err(BackupError::FileNotFound(from.to_path_buf()));
    }
    let io_err = |source: io::Error| BackupError::Io {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    // Removing `to` must never reach into `from`, and copying `from` must
    // never write into itself.
    let resolved_from = resolve(from).map_err(io_err)?;
    let resolved_to = resolve(to).map_err(io_err)?;
    if resolved_to.starts_with(&resolved_from) || resolved_from.starts_with(&resolved_to) {
        return Err(BackupError::Overlap {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
    }

    if to.is_dir() && !to.is_symlink() {
        fs::remove_dir_all(to).map_err(io_err)?;
    } else if to.exists() || to.is_symlink() {
        fs::remove_file(to).map_err(io_err)?;
    }
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    copy_recursive(from, to).map_err(io_err)
}

/// Absolute form of `path` with symlinks resolved for the part that exists.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(base) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(base, |resolved, part| resolved.join(part)))
            }
            Err(err) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Err(err),
            },
        }
    }
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    if !from.is_dir() {
        fs::copy(from, to)?;
        return Ok(());
    }
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(())
}

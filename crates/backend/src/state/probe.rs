//! Stateless filesystem predicates.
//!
//! `exists` and `is_dir` follow symbolic links, the `symlink_*` predicates do
//! not. Errors other than "not found" (permissions, I/O) read as `false`; the
//! caller's next filesystem operation surfaces the real error.

use std::path::{Path, PathBuf};

/// True if something exists at `path`, following symlinks.
///
/// A dangling symlink does not exist by this definition.
pub fn exists(path: &Path) -> bool {
  std::fs::metadata(path).is_ok()
}

/// True if `path` resolves to a directory, following symlinks.
pub fn is_dir(path: &Path) -> bool {
  std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// True if `path` itself is a symbolic link, dangling or not.
pub fn is_symlink(path: &Path) -> bool {
  std::fs::symlink_metadata(path)
    .map(|m| m.file_type().is_symlink())
    .unwrap_or(false)
}

/// True if any directory entry exists at `path`, without following symlinks.
pub fn entry_exists(path: &Path) -> bool {
  std::fs::symlink_metadata(path).is_ok()
}

/// True if `path` is a symbolic link whose target currently exists.
pub fn symlink_target_exists(path: &Path) -> bool {
  is_symlink(path) && exists(path)
}

/// The target a symbolic link points at, if `path` is one.
pub fn symlink_target(path: &Path) -> Option<PathBuf> {
  std::fs::read_link(path).ok()
}

use std::path::{Path, PathBuf};

use crate::{domain::error::RegistryError, state::probe};

/// Durable indirection between a domain path and its real content.
///
/// Domains whose content lives elsewhere (removable media, network mounts) get
/// a proxy link at `<group>/symlinks/<domain>` pointing at the source. The
/// proxy is never deleted or repointed by the reconciler; the domain path is
/// linked to the proxy, not to the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkProxy {
  /// Where the real content lives
  pub source: PathBuf,
  /// The durable link to `source`
  pub proxy: PathBuf,
}

impl SymlinkProxy {
  pub fn new(source: impl Into<PathBuf>, proxy: impl Into<PathBuf>) -> Self {
    Self {
      source: source.into(),
      proxy: proxy.into(),
    }
  }

  /// True if the source content is currently reachable
  pub fn is_available(&self) -> bool {
    probe::exists(&self.source)
  }

  /// Create the proxy link if it does not exist yet.
  ///
  /// Fails if the source is unavailable.
  pub fn create_proxy(&self) -> Result<(), RegistryError> {
    if !self.is_available() {
      return Err(RegistryError::SymlinkSourceMissing(self.source.clone()));
    }
    if probe::entry_exists(&self.proxy) {
      return Ok(());
    }
    if let Some(parent) = self.proxy.parent() {
      std::fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
    }
    std::os::unix::fs::symlink(&self.source, &self.proxy).map_err(|e| RegistryError::io(&self.proxy, e))
  }

  /// Delete the proxy link. Only used when the domain record itself is removed.
  pub fn delete_proxy(&self) -> Result<(), RegistryError> {
    match std::fs::remove_file(&self.proxy) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(RegistryError::io(&self.proxy, e)),
    }
  }

  /// True if `path` is a symlink pointing at this proxy
  pub fn is_linked_from(&self, path: &Path) -> bool {
    probe::symlink_target(path).is_some_and(|target| target == self.proxy)
  }
}

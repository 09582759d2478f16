//! Per-domain state machine over the filesystem.
//!
//! A domain path is in exactly one of these representations:
//!
//! ```text
//!            ensure_writable_path_exists
//!   Absent ───────────────────────────────▶ TemporaryPlaceholder
//!     ▲  ▲                                    │        │
//!     │  │ release (empty)                    │        │ release (has content)
//!     │  └────────────────────────────────────┘        ▼
//!     │                                            RealContent
//!     │ unlink_from_proxy (source gone)
//!     │
//!   SymlinkedToProxy ◀── link_to_proxy (from Absent or TemporaryPlaceholder)
//! ```
//!
//! Whether a placeholder is temporary is recorded by a marker file inside it,
//! never in memory, so the state survives restarts of the daemon. Every
//! operation is idempotent and reacts only to the filesystem and its explicit
//! inputs; deciding *when* to call them is the reconciler's job.
//!
//! Real content is never deleted: only paths carrying the temporary marker are
//! ever removed, and only symlinks are ever unlinked.

pub mod probe;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{
  Domain,
  config::PlaceholderConfig,
  unit::TEMPORARY_MARKER,
};

/// What currently lives at a domain's content path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
  Absent,
  TemporaryPlaceholder,
  RealContent,
  SymlinkedToProxy,
}

/// The effect a state operation had on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Unchanged,
  CreatedPlaceholder,
  ReleasedPlaceholder,
  DemotedPlaceholder,
  LinkedToProxy,
  ReplacedPlaceholderWithLink,
  UnlinkedFromProxy,
  LinkedRecoveryView,
  UnlinkedRecoveryView,
}

impl Transition {
  pub fn is_change(&self) -> bool {
    !matches!(self, Self::Unchanged)
  }
}

/// A single transition step failed. The reconciler logs it and retries on the
/// next tick.
#[derive(Debug, thiserror::Error)]
#[error("[domain: {domain}] failed to {action} at {}: {source}", path.display())]
pub struct StateError {
  pub domain: String,
  pub action: &'static str,
  pub path: PathBuf,
  #[source]
  pub source: std::io::Error,
}

/// Transition operations for one domain.
pub struct DomainState<'a> {
  domain: &'a Domain,
  rules: &'a PlaceholderConfig,
}

impl<'a> DomainState<'a> {
  pub fn new(domain: &'a Domain, rules: &'a PlaceholderConfig) -> Self {
    Self { domain, rules }
  }

  /// Resolve the current representation of the content path
  pub fn resolve(&self) -> Representation {
    let content = &self.domain.content_path;

    if self.domain.is_symlinked() && probe::is_symlink(content) {
      return Representation::SymlinkedToProxy;
    }
    if !probe::exists(content) {
      return Representation::Absent;
    }
    if self.domain.temporary_path.is_none() && self.is_temporary() {
      return Representation::TemporaryPlaceholder;
    }
    Representation::RealContent
  }

  /// True if the writable path carries the temporary marker.
  ///
  /// A writable path that is a symlink is never temporary: the marker would
  /// belong to whatever the link points at.
  pub fn is_temporary(&self) -> bool {
    has_marker(self.domain.writable_path())
  }

  /// True if the writable path holds nothing but the marker and ignored entries
  pub fn is_empty(&self) -> Result<bool, StateError> {
    let writable = self.domain.writable_path();
    let entries = std::fs::read_dir(writable).map_err(|e| self.error("list placeholder", writable, e))?;

    for entry in entries {
      let entry = entry.map_err(|e| self.error("list placeholder", writable, e))?;
      let name = entry.file_name();
      let name = name.to_string_lossy();
      if name == TEMPORARY_MARKER || self.rules.ignored_entries.iter().any(|ignored| *ignored == name) {
        continue;
      }
      return Ok(false);
    }

    Ok(true)
  }

  /// Create a temporary placeholder if nothing exists at the writable path.
  ///
  /// Directory domains get a directory at the content path; single-file
  /// domains get one at `<file>.dfb`. Safe to call on every tick.
  pub fn ensure_writable_path_exists(&self) -> Result<Transition, StateError> {
    let content = &self.domain.content_path;

    let needs_placeholder = if self.domain.is_single_file() {
      !probe::entry_exists(self.domain.writable_path())
    } else {
      // A dangling link that is not ours is left for the user to sort out
      !probe::entry_exists(content) || (!probe::exists(content) && self.domain.temporary_path.is_some())
    };
    if !needs_placeholder {
      return Ok(Transition::Unchanged);
    }

    let writable = self.domain.writable_path();
    debug!(domain = %self.domain.name, path = %writable.display(), "Creating temporary path");

    std::fs::create_dir_all(writable).map_err(|e| self.error("create placeholder", writable, e))?;
    let marker = self.domain.temporary_marker();
    std::fs::write(&marker, b"").map_err(|e| self.error("create temporary marker", &marker, e))?;

    Ok(Transition::CreatedPlaceholder)
  }

  /// Remove a temporary placeholder that never received content, or demote one
  /// that did to a permanent path by removing only its marker.
  ///
  /// Paths without the marker are never touched.
  pub fn release_if_temporary_and_empty(&self) -> Result<Transition, StateError> {
    let writable = self.domain.writable_path();
    if !probe::is_dir(writable) || !self.is_temporary() {
      return Ok(Transition::Unchanged);
    }

    if self.is_empty()? {
      debug!(domain = %self.domain.name, path = %writable.display(), "Removing temporary path");
      std::fs::remove_dir_all(writable).map_err(|e| self.error("remove placeholder", writable, e))?;
      Ok(Transition::ReleasedPlaceholder)
    } else {
      debug!(domain = %self.domain.name, path = %writable.display(), "Removing temporary flag");
      let marker = self.domain.temporary_marker();
      std::fs::remove_file(&marker).map_err(|e| self.error("remove temporary marker", &marker, e))?;
      Ok(Transition::DemotedPlaceholder)
    }
  }

  /// Link the content path to the proxy if it is absent or only a placeholder.
  ///
  /// Placeholder content is discarded: it never was the real backing store.
  /// Only call this while the symlink source is available.
  pub fn link_to_proxy_if_eligible(&self) -> Result<Transition, StateError> {
    let Some(ref symlink) = self.domain.symlink else {
      return Ok(Transition::Unchanged);
    };
    let content = &self.domain.content_path;

    if !probe::entry_exists(&symlink.proxy) {
      if let Some(parent) = symlink.proxy.parent() {
        std::fs::create_dir_all(parent).map_err(|e| self.error("create symlinks directory", parent, e))?;
      }
      std::os::unix::fs::symlink(&symlink.source, &symlink.proxy)
        .map_err(|e| self.error("recreate proxy", &symlink.proxy, e))?;
    }

    if symlink.is_linked_from(content) {
      return Ok(Transition::Unchanged);
    }

    // Links dfb did not create are left alone, dangling or not
    let transition = if !probe::entry_exists(content) {
      debug!(domain = %self.domain.name, "Domain path did not exist, linking to source");
      Transition::LinkedToProxy
    } else if has_marker(content) {
      debug!(domain = %self.domain.name, "Domain path was temporary, linking to source");
      std::fs::remove_dir_all(content).map_err(|e| self.error("remove placeholder", content, e))?;
      Transition::ReplacedPlaceholderWithLink
    } else {
      return Ok(Transition::Unchanged);
    };

    std::os::unix::fs::symlink(&symlink.proxy, content).map_err(|e| self.error("link to proxy", content, e))?;
    Ok(transition)
  }

  /// Remove the link to the proxy once the symlink source went away.
  ///
  /// The content path is left absent, to be filled by a placeholder later.
  pub fn unlink_from_proxy_if_source_gone(&self) -> Result<Transition, StateError> {
    let Some(ref symlink) = self.domain.symlink else {
      return Ok(Transition::Unchanged);
    };
    let content = &self.domain.content_path;

    if symlink.is_available() || !probe::is_symlink(content) {
      return Ok(Transition::Unchanged);
    }
    if !symlink.is_linked_from(content) && probe::exists(content) {
      return Ok(Transition::Unchanged);
    }

    debug!(domain = %self.domain.name, "Symlink source went away, removing symlink");
    std::fs::remove_file(content).map_err(|e| self.error("unlink from proxy", content, e))?;
    Ok(Transition::UnlinkedFromProxy)
  }

  /// True if a `__recover__` link exists, dangling or not
  pub fn recovery_view_linked(&self) -> bool {
    probe::entry_exists(&self.domain.recovery_link_path())
  }

  /// Link `__recover__` into the mounted recovery view under `mountpoint`
  pub fn link_to_backup_recovery_view(&self, mountpoint: &Path) -> Result<Transition, StateError> {
    if self.recovery_view_linked() {
      return Ok(Transition::Unchanged);
    }

    let link = self.domain.recovery_link_path();
    let target = self.domain.recovery_link_target(mountpoint);
    std::os::unix::fs::symlink(&target, &link).map_err(|e| self.error("link recovery view", &link, e))?;
    Ok(Transition::LinkedRecoveryView)
  }

  /// Remove the `__recover__` link. A regular file of that name is left alone.
  pub fn unlink_backup_recovery_view(&self) -> Result<Transition, StateError> {
    let link = self.domain.recovery_link_path();
    if !probe::is_symlink(&link) {
      return Ok(Transition::Unchanged);
    }

    std::fs::remove_file(&link).map_err(|e| self.error("unlink recovery view", &link, e))?;
    Ok(Transition::UnlinkedRecoveryView)
  }

  fn error(&self, action: &'static str, path: &Path, source: std::io::Error) -> StateError {
    StateError {
      domain: self.domain.name.clone(),
      action,
      path: path.to_path_buf(),
      source,
    }
  }
}

fn has_marker(path: &Path) -> bool {
  !probe::is_symlink(path) && probe::exists(&path.join(TEMPORARY_MARKER))
}

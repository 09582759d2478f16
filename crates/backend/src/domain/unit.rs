//! Domains: one backup unit each, loaded from a record under `<group>/domains/`.

use std::path::{Path, PathBuf};

use super::{error::RegistryError, repository::RepositoryScope, symlink::SymlinkProxy};
use crate::state::probe;

/// Exclusions written to new domain records
pub const DEFAULT_EXCLUSIONS: &[&str] = &["**/node_modules", "**/.DS_Store", "**/venv"];

/// Name of the zero-byte file that marks a writable path as a placeholder
pub const TEMPORARY_MARKER: &str = ".dfb-temporary";

/// Name of the link into the mounted recovery view
pub const RECOVERY_LINK: &str = "__recover__";

/// Suffix of the placeholder path of single-file domains
pub const SINGLE_FILE_SUFFIX: &str = ".dfb";

// ============================================================================
// Domain Record
// ============================================================================

/// The on-disk record of a domain: `key: value` lines.
///
/// ```text
/// path: /home/user/notes
/// symlink: /Volumes/External/notes
/// exclusions: **/node_modules **/.DS_Store **/venv
/// repos: *
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
  pub path: PathBuf,
  pub symlink: Option<PathBuf>,
  pub exclusions: Vec<String>,
  pub repositories: RepositoryScope,
}

impl DomainRecord {
  /// A record for a new domain with default exclusions, backing up everywhere
  pub fn new(path: impl Into<PathBuf>, symlink: Option<PathBuf>) -> Self {
    Self {
      path: path.into(),
      symlink,
      exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
      repositories: RepositoryScope::All,
    }
  }

  /// Parse a record. `source` is only used for error messages.
  pub fn parse(content: &str, source: &Path) -> Result<Self, RegistryError> {
    let mut path = None;
    let mut symlink = None;
    let mut exclusions = Vec::new();
    let mut repositories = RepositoryScope::All;

    for line in content.lines() {
      let Some((key, value)) = line.split_once(':') else {
        continue;
      };
      let value = value.trim();

      match key.trim() {
        "path" if !value.is_empty() => path = Some(PathBuf::from(value)),
        "symlink" if !value.is_empty() => symlink = Some(PathBuf::from(value)),
        "exclusions" => exclusions = value.split_whitespace().map(String::from).collect(),
        "repos" => repositories = RepositoryScope::parse(value),
        _ => {}
      }
    }

    let path = path.ok_or_else(|| RegistryError::malformed(source, "missing path"))?;

    Ok(Self {
      path,
      symlink,
      exclusions,
      repositories,
    })
  }

  /// Render the record in the format `parse` reads
  pub fn render(&self) -> String {
    let symlink = self
      .symlink
      .as_ref()
      .map(|p| p.display().to_string())
      .unwrap_or_default();

    format!(
      "path: {}\nsymlink: {}\nexclusions: {}\nrepos: {}\n",
      self.path.display(),
      symlink,
      self.exclusions.join(" "),
      self.repositories
    )
  }
}

// ============================================================================
// Domain
// ============================================================================

/// A directory (or single file) to back up.
///
/// The on-disk representation at `content_path` is only changed through
/// [`crate::state::DomainState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
  /// Name, unique within its group
  pub name: String,
  /// Name of the group the domain belongs to
  pub group_name: String,
  /// The path the backup operates on, eg. ~/notes or ~/todo.txt
  pub content_path: PathBuf,
  /// Placeholder path for single-file domains (`<content_path>.dfb`).
  /// Directory domains use `content_path` as their placeholder.
  pub temporary_path: Option<PathBuf>,
  /// Path of the domain record
  pub record_path: PathBuf,
  /// Present if the domain content lives behind a proxy link
  pub symlink: Option<SymlinkProxy>,
  /// Glob patterns passed to restic as an exclude file
  pub exclusions: Vec<String>,
  /// Repositories this domain backs up to
  pub repositories: RepositoryScope,
}

impl Domain {
  /// Build a domain from its record.
  ///
  /// `group_path` is the group directory, which holds `domains/` and `symlinks/`.
  pub fn from_record(name: &str, group_name: &str, group_path: &Path, record: DomainRecord) -> Self {
    let symlink = record
      .symlink
      .map(|source| SymlinkProxy::new(source, group_path.join("symlinks").join(name)));

    let mut domain = Self {
      name: name.to_string(),
      group_name: group_name.to_string(),
      content_path: record.path,
      temporary_path: None,
      record_path: group_path.join("domains").join(name),
      symlink,
      exclusions: record.exclusions,
      repositories: record.repositories,
    };

    if domain.is_single_file() {
      let mut temporary = domain.content_path.clone().into_os_string();
      temporary.push(SINGLE_FILE_SUFFIX);
      domain.temporary_path = Some(PathBuf::from(temporary));
    }

    domain
  }

  /// Load a domain record from `<group_path>/domains/<name>`
  pub fn load(name: &str, group_name: &str, group_path: &Path) -> Result<Self, RegistryError> {
    let record_path = group_path.join("domains").join(name);
    let content = std::fs::read_to_string(&record_path).map_err(|e| RegistryError::io(&record_path, e))?;
    let record = DomainRecord::parse(&content, &record_path)?;
    Ok(Self::from_record(name, group_name, group_path, record))
  }

  /// The record describing this domain
  pub fn record(&self) -> DomainRecord {
    DomainRecord {
      path: self.content_path.clone(),
      symlink: self.symlink.as_ref().map(|s| s.source.clone()),
      exclusions: self.exclusions.clone(),
      repositories: self.repositories.clone(),
    }
  }

  /// Write the domain record to `record_path`
  pub fn save(&self) -> Result<(), RegistryError> {
    std::fs::write(&self.record_path, self.record().render()).map_err(|e| RegistryError::io(&self.record_path, e))
  }

  /// The path placeholders are created at and released from
  pub fn writable_path(&self) -> &Path {
    self.temporary_path.as_deref().unwrap_or(&self.content_path)
  }

  /// Path of the placeholder marker file
  pub fn temporary_marker(&self) -> PathBuf {
    self.writable_path().join(TEMPORARY_MARKER)
  }

  /// A domain backing up a single file rather than a directory.
  ///
  /// A missing content path reads as a directory domain.
  pub fn is_single_file(&self) -> bool {
    probe::exists(&self.content_path) && !probe::is_dir(&self.content_path)
  }

  pub fn is_symlinked(&self) -> bool {
    self.symlink.is_some()
  }

  /// Where the `__recover__` link lives: beside the placeholder for
  /// single-file domains, inside the content path otherwise.
  pub fn recovery_link_path(&self) -> PathBuf {
    match self.temporary_path {
      Some(ref temporary) => temporary.join(RECOVERY_LINK),
      None => self.content_path.join(RECOVERY_LINK),
    }
  }

  /// What the `__recover__` link points at inside a mounted recovery view
  pub fn recovery_link_target(&self, mountpoint: &Path) -> PathBuf {
    mountpoint.join("tags").join(&self.name)
  }

  /// The directory (or file) restic is run against: the proxy for symlinked
  /// domains, the content path otherwise.
  pub fn working_path(&self) -> &Path {
    match self.symlink {
      Some(ref symlink) => &symlink.proxy,
      None => &self.content_path,
    }
  }
}

//! Groups and the registry that finds them on disk.
//!
//! ```text
//! <root>/
//!   config.toml
//!   <group>/
//!     domains/<name>      domain records
//!     repos/<name>        repository locators
//!     symlinks/<name>     proxy links
//!     mountpoint/         recovery view mount root
//!     stats/
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{
  error::{RegistryError, validate_name},
  repository::Repository,
  unit::{Domain, DomainRecord},
};

const GROUP_SUBDIRS: &[&str] = &["repos", "domains", "symlinks", "stats"];

// ============================================================================
// Registry
// ============================================================================

/// Entry point to the on-disk group layout.
///
/// Carries the root and home directories explicitly so that nothing reads
/// global state; tests point it at temporary directories.
#[derive(Debug, Clone)]
pub struct Registry {
  root: PathBuf,
  home: PathBuf,
}

impl Registry {
  pub fn new(root: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      home: home.into(),
    }
  }

  /// Registry at the default locations (`$DFB_DIR` or `~/.dfb`, `$DFB_HOME` or `~`)
  pub fn with_defaults() -> Self {
    Self::new(crate::dirs::default_root_dir(), crate::dirs::default_home_dir())
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn home(&self) -> &Path {
    &self.home
  }

  /// All groups, sorted by name. A missing root means no groups.
  pub fn groups(&self) -> Result<Vec<Group>, RegistryError> {
    let entries = match std::fs::read_dir(&self.root) {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(RegistryError::io(&self.root, e)),
    };

    let mut groups: Vec<Group> = entries
      .flatten()
      .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
      .filter_map(|entry| entry.file_name().to_str().map(|name| self.group_handle(name)))
      .collect();

    groups.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(groups)
  }

  /// Look up a group by name
  pub fn group(&self, name: &str) -> Result<Group, RegistryError> {
    validate_name(name)?;
    let group = self.group_handle(name);
    if !group.path.is_dir() {
      return Err(RegistryError::GroupNotFound(name.to_string()));
    }
    Ok(group)
  }

  /// Create a new group with its directory skeleton
  pub fn create_group(&self, name: &str) -> Result<Group, RegistryError> {
    validate_name(name)?;
    let group = self.group_handle(name);
    if group.path.exists() {
      return Err(RegistryError::GroupExists(name.to_string()));
    }

    for sub in GROUP_SUBDIRS {
      let dir = group.path.join(sub);
      std::fs::create_dir_all(&dir).map_err(|e| RegistryError::io(&dir, e))?;
    }

    debug!(group = %name, path = %group.path.display(), "Created group");
    Ok(group)
  }

  fn group_handle(&self, name: &str) -> Group {
    Group {
      name: name.to_string(),
      path: self.root.join(name),
      home: self.home.clone(),
    }
  }
}

// ============================================================================
// Group
// ============================================================================

/// A named collection of domains and the repositories they back up to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
  pub name: String,
  pub path: PathBuf,
  home: PathBuf,
}

impl Group {
  /// Where restic mounts the group's repository as a recovery view
  pub fn mountpoint(&self) -> PathBuf {
    self.path.join("mountpoint")
  }

  pub fn domains_dir(&self) -> PathBuf {
    self.path.join("domains")
  }

  pub fn repos_dir(&self) -> PathBuf {
    self.path.join("repos")
  }

  pub fn symlinks_dir(&self) -> PathBuf {
    self.path.join("symlinks")
  }

  /// Names of all domain records, sorted
  pub fn domain_names(&self) -> Result<Vec<String>, RegistryError> {
    list_names(&self.domains_dir())
  }

  /// Load every domain of the group.
  ///
  /// Stops at the first malformed record; use [`Group::domain_names`] and
  /// [`Group::domain`] to load them one by one.
  pub fn domains(&self) -> Result<Vec<Domain>, RegistryError> {
    self.domain_names()?.iter().map(|name| self.domain(name)).collect()
  }

  /// Load a single domain
  pub fn domain(&self, name: &str) -> Result<Domain, RegistryError> {
    validate_name(name)?;
    if !self.domains_dir().join(name).is_file() {
      return Err(RegistryError::DomainNotFound {
        group: self.name.clone(),
        name: name.to_string(),
      });
    }
    Domain::load(name, &self.name, &self.path)
  }

  pub fn domain_exists(&self, name: &str) -> bool {
    self.domains_dir().join(name).is_file()
  }

  /// Add a domain at `<home>/<name>`.
  ///
  /// With a symlink source, the proxy link is created first and the source
  /// must exist.
  pub fn add_domain(&self, name: &str, symlink: Option<PathBuf>) -> Result<Domain, RegistryError> {
    validate_name(name)?;
    if self.domain_exists(name) {
      return Err(RegistryError::DomainExists {
        group: self.name.clone(),
        name: name.to_string(),
      });
    }

    let record = DomainRecord::new(self.home.join(name), symlink);
    let domain = Domain::from_record(name, &self.name, &self.path, record);

    if let Some(ref proxy) = domain.symlink {
      proxy.create_proxy()?;
    }

    let dir = self.domains_dir();
    std::fs::create_dir_all(&dir).map_err(|e| RegistryError::io(&dir, e))?;
    domain.save()?;

    debug!(group = %self.name, domain = %name, "Added domain");
    Ok(domain)
  }

  /// Remove a domain record and its proxy link. The domain's content is left alone.
  pub fn remove_domain(&self, name: &str) -> Result<Domain, RegistryError> {
    let domain = self.domain(name)?;

    std::fs::remove_file(&domain.record_path).map_err(|e| RegistryError::io(&domain.record_path, e))?;
    if let Some(ref proxy) = domain.symlink {
      proxy.delete_proxy()?;
    }

    debug!(group = %self.name, domain = %name, "Removed domain");
    Ok(domain)
  }

  /// Entries of the home directory that are not a domain of this group
  pub fn unregistered_entries(&self) -> Result<Vec<String>, RegistryError> {
    let registered = self.domain_names()?;
    let mut entries: Vec<String> = list_names(&self.home)?
      .into_iter()
      .filter(|name| !registered.contains(name))
      .collect();
    entries.sort();
    Ok(entries)
  }

  /// All repositories of the group, sorted by name
  pub fn repositories(&self) -> Result<Vec<Repository>, RegistryError> {
    list_names(&self.repos_dir())?
      .iter()
      .map(|name| self.repository(name))
      .collect()
  }

  /// Look up a repository by name
  pub fn repository(&self, name: &str) -> Result<Repository, RegistryError> {
    validate_name(name)?;
    let path = self.repos_dir().join(name);
    match std::fs::read_to_string(&path) {
      Ok(locator) => Ok(Repository::new(name, locator.trim())),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RegistryError::RepositoryNotFound {
        group: self.name.clone(),
        name: name.to_string(),
      }),
      Err(e) => Err(RegistryError::io(&path, e)),
    }
  }

  /// Register a repository with the group
  pub fn add_repository(&self, repository: &Repository) -> Result<(), RegistryError> {
    validate_name(&repository.name)?;
    let dir = self.repos_dir();
    let path = dir.join(&repository.name);
    if path.exists() {
      return Err(RegistryError::RepositoryExists {
        group: self.name.clone(),
        name: repository.name.clone(),
      });
    }

    std::fs::create_dir_all(&dir).map_err(|e| RegistryError::io(&dir, e))?;
    std::fs::write(&path, format!("{}\n", repository.locator)).map_err(|e| RegistryError::io(&path, e))
  }
}

/// Sorted entry names of a directory; a missing directory has no entries.
fn list_names(dir: &Path) -> Result<Vec<String>, RegistryError> {
  let entries = match std::fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(RegistryError::io(dir, e)),
  };

  let mut names: Vec<String> = entries
    .flatten()
    .filter_map(|entry| entry.file_name().to_str().map(String::from))
    .collect();
  names.sort();
  Ok(names)
}

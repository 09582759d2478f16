use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Marker in a domain record meaning "back up to every repository of the group"
pub const ALL_REPOSITORIES: &str = "*";

/// A named restic repository a group backs up to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
  /// Name, unique within the group
  pub name: String,
  /// Restic repository locator (path, sftp:..., s3:..., rest:...)
  pub locator: String,
}

impl Repository {
  pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      locator: locator.into(),
    }
  }
}

/// The repositories a domain backs up to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RepositoryScope {
  #[default]
  All,
  Only(BTreeSet<String>),
}

impl RepositoryScope {
  /// Parse the `repos` value of a domain record: `*` or a comma-separated list.
  ///
  /// An empty value reads as `*`.
  pub fn parse(value: &str) -> Self {
    let value = value.trim();
    if value.is_empty() || value == ALL_REPOSITORIES {
      return Self::All;
    }

    let names: BTreeSet<String> = value
      .split(',')
      .map(str::trim)
      .filter(|name| !name.is_empty())
      .map(String::from)
      .collect();

    if names.contains(ALL_REPOSITORIES) {
      Self::All
    } else {
      Self::Only(names)
    }
  }

  pub fn includes(&self, repository: &str) -> bool {
    match self {
      Self::All => true,
      Self::Only(names) => names.contains(repository),
    }
  }
}

impl std::fmt::Display for RepositoryScope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::All => write!(f, "{}", ALL_REPOSITORIES),
      Self::Only(names) => write!(f, "{}", names.iter().cloned().collect::<Vec<_>>().join(",")),
    }
  }
}

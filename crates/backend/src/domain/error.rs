use std::path::PathBuf;

/// Configuration errors: missing or malformed groups, repositories and domains.
///
/// These are surfaced to the caller immediately and never retried.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  #[error("could not find group {0}")]
  GroupNotFound(String),
  #[error("group {0} already exists")]
  GroupExists(String),
  #[error("could not find repository {name} in group {group}")]
  RepositoryNotFound { group: String, name: String },
  #[error("repository {name} already exists in group {group}")]
  RepositoryExists { group: String, name: String },
  #[error("could not find domain {name} in group {group}")]
  DomainNotFound { group: String, name: String },
  #[error("domain {name} already exists in group {group}")]
  DomainExists { group: String, name: String },
  #[error("invalid name {0:?}: names must be non-empty and contain no path separators")]
  InvalidName(String),
  #[error("malformed domain record {}: {reason}", path.display())]
  MalformedRecord { path: PathBuf, reason: String },
  #[error("could not find source for proxy at: {}", .0.display())]
  SymlinkSourceMissing(PathBuf),
  #[error("I/O error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl RegistryError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }

  pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
    Self::MalformedRecord {
      path: path.into(),
      reason: reason.into(),
    }
  }
}

/// Reject names that would escape their directory.
pub(crate) fn validate_name(name: &str) -> Result<(), RegistryError> {
  if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
    return Err(RegistryError::InvalidName(name.to_string()));
  }
  Ok(())
}

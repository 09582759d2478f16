//! Backup subprocess adapter
//!
//! The pipeline only sees the [`BackupRunner`] trait. [`ResticRunner`] drives
//! the `restic` binary; tests script their own runner.

mod command;
mod session;

use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use self::{command::ResticRunner, session::Session};
use crate::domain::Repository;

/// Environment variable read for the repository password before prompting
pub const PASSWORD_ENV: &str = "DFB_PASSWORD";

pub type Result<T> = std::result::Result<T, RunnerError>;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
  #[error("failed to start {binary}: {source}")]
  Spawn {
    binary: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to write exclusion file {}: {source}", path.display())]
  ExclusionFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("backup timed out after {0}s")]
  Timeout(u64),
  #[error("invalid password for repository {0}")]
  InvalidPassword(String),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// A repository password.
///
/// Only ever handed to the subprocess on stdin. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
  pub fn new(password: impl Into<String>) -> Self {
    Self(password.into())
  }

  /// Password from `$DFB_PASSWORD`, if set
  pub fn from_env() -> Option<Self> {
    std::env::var(PASSWORD_ENV).ok().map(Self)
  }

  pub fn expose(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Password {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Password(****)")
  }
}

/// One backup invocation
#[derive(Debug, Clone)]
pub struct BackupRequest {
  pub repository: Repository,
  /// Used as the snapshot tag
  pub domain: String,
  /// Directory the subprocess runs in
  pub working_dir: PathBuf,
  /// What to back up, relative to `working_dir`: `.` or a file name
  pub target: String,
  pub exclusions: Vec<String>,
}

#[async_trait]
pub trait BackupRunner: Send + Sync {
  /// Run a backup, sending every output line to `lines` as it is read.
  ///
  /// Returns the subprocess exit code. A non-zero exit is not an error.
  async fn backup(
    &self,
    request: &BackupRequest,
    password: &Password,
    lines: &mpsc::UnboundedSender<String>,
  ) -> Result<i32>;

  /// True if `password` opens `repository`
  async fn verify_password(&self, repository: &Repository, password: &Password) -> Result<bool>;
}

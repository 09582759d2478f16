use tracing::debug;

use super::{BackupRunner, Password, Result, RunnerError};
use crate::domain::Repository;

/// A repository together with a password known to open it.
///
/// Created once per backup run and shared by every worker.
#[derive(Debug, Clone)]
pub struct Session {
  pub repository: Repository,
  pub password: Password,
}

impl Session {
  /// Verify `password` against the repository. A wrong password is an error.
  pub async fn open(runner: &dyn BackupRunner, repository: Repository, password: Password) -> Result<Self> {
    if !runner.verify_password(&repository, &password).await? {
      return Err(RunnerError::InvalidPassword(repository.name));
    }

    debug!(repository = %repository.name, "Opened repository session");
    Ok(Self { repository, password })
  }

  /// A session whose password has not been checked
  pub fn unverified(repository: Repository, password: Password) -> Self {
    Self { repository, password }
  }
}

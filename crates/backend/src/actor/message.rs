//! Message types passed between pipeline stages

use crate::domain::Domain;

/// How a domain left the backup stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
  /// Restic ran to completion. A non-zero exit code is logged but not fatal.
  Completed { exit_code: i32 },
  /// Nothing existed at the working path; restic was not run
  Unavailable,
  /// Restic could not be run, or was killed
  Failed { reason: String },
}

impl BackupOutcome {
  /// True if restic ran and exited zero
  pub fn is_success(&self) -> bool {
    matches!(self, Self::Completed { exit_code: 0 })
  }

  /// True if restic ran at all
  pub fn was_backed_up(&self) -> bool {
    matches!(self, Self::Completed { .. })
  }
}

/// Producer output, consumed by the backup workers
#[derive(Debug)]
pub enum PipelineDomain {
  Domain(Box<Domain>),
  /// Signals the producer is done
  Done,
}

/// Backup worker output, consumed by the statistics workers
#[derive(Debug)]
pub enum BackedUpDomain {
  Domain { domain: Box<Domain>, outcome: BackupOutcome },
  /// Signals every backup worker is done
  Done,
}

/// Final record of one domain in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainResult {
  pub domain: String,
  pub outcome: BackupOutcome,
}

//! Backup stage - runs restic for one domain at a time.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{DoneTracker, stream::MessageStream};
use crate::{
  actor::message::{BackedUpDomain, BackupOutcome, PipelineDomain},
  domain::Domain,
  protocol::{Action, ControlMessage},
  restic::{BackupRequest, BackupRunner, Session},
  state::probe,
};

/// What every backup worker shares
#[derive(Clone)]
pub struct BackupContext {
  pub group: String,
  pub session: Arc<Session>,
  pub runner: Arc<dyn BackupRunner>,
  pub stream: MessageStream,
}

/// Backup worker - pulls domains from the shared receiver and backs them up.
///
/// Every domain is forwarded to the statistics stage whatever its outcome, so
/// one failing domain never holds up the rest of the run.
pub async fn backup_worker(
  worker_id: usize,
  ctx: BackupContext,
  rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PipelineDomain>>>,
  tx: mpsc::Sender<BackedUpDomain>,
  done_tx: mpsc::Sender<()>,
  cancel: CancellationToken,
) {
  trace!(worker_id, "Backup worker starting");
  let mut processed = 0;

  loop {
    let msg = {
      let mut rx_guard = rx.lock().await;
      tokio::select! {
          biased;
          _ = cancel.cancelled() => {
              trace!(worker_id, processed, "Backup worker cancelled");
              break;
          }
          msg = rx_guard.recv() => msg
      }
    };

    match msg {
      Some(PipelineDomain::Domain(domain)) => {
        let outcome = backup_domain(&ctx, &domain).await;
        processed += 1;

        if tx.send(BackedUpDomain::Domain { domain, outcome }).await.is_err() {
          trace!(worker_id, "Backup worker: downstream closed");
          break;
        }
      }
      Some(PipelineDomain::Done) | None => {
        trace!(worker_id, processed, "Backup worker: input exhausted");
        break;
      }
    }
  }

  let _ = done_tx.send(()).await;
  trace!(worker_id, processed, "Backup worker finished");
}

/// Aggregates Done signals from backup workers and forwards to the statistics stage.
pub async fn backup_done_aggregator(
  worker_count: usize,
  mut done_rx: mpsc::Receiver<()>,
  tx: mpsc::Sender<BackedUpDomain>,
) {
  let mut tracker = DoneTracker::new(worker_count);

  while let Some(()) = done_rx.recv().await {
    if tracker.record_done() {
      let _ = tx.send(BackedUpDomain::Done).await;
      trace!(worker_count, "All backup workers finished, sent Done");
      break;
    }
  }
}

async fn backup_domain(ctx: &BackupContext, domain: &Domain) -> BackupOutcome {
  let control = |action| ControlMessage::new(&ctx.group, &domain.name, action).to_line();

  let working = domain.working_path();
  if !probe::exists(working) {
    info!(domain = %domain.name, path = %working.display(), "Domain unavailable, skipping");
    ctx.stream.send_block([control(Action::Unavailable)]).await;
    return BackupOutcome::Unavailable;
  }

  let (working_dir, target) = split_target(working);
  let request = BackupRequest {
    repository: ctx.session.repository.clone(),
    domain: domain.name.clone(),
    working_dir,
    target,
    exclusions: domain.exclusions.clone(),
  };

  debug!(domain = %domain.name, "Backing up domain");

  let mut stream = ctx.stream.open_domain(control(Action::Begin));
  let (line_tx, mut line_rx) = mpsc::unbounded_channel();

  let runner = ctx.runner.clone();
  let session = ctx.session.clone();
  let run = async move {
    let result = runner.backup(&request, &session.password, &line_tx).await;
    drop(line_tx);
    result
  };
  let relay = async {
    while let Some(line) = line_rx.recv().await {
      stream.push(line);
    }
  };

  let (result, ()) = tokio::join!(run, relay);
  stream.finish().await;

  match result {
    Ok(0) => {
      info!(domain = %domain.name, "Backup complete");
      BackupOutcome::Completed { exit_code: 0 }
    }
    Ok(exit_code) => {
      warn!(domain = %domain.name, exit_code, "Restic exited with non-zero status");
      BackupOutcome::Completed { exit_code }
    }
    Err(e) => {
      warn!(domain = %domain.name, error = %e, "Backup failed");
      BackupOutcome::Failed { reason: e.to_string() }
    }
  }
}

/// Directories are backed up as `.` from inside them, single files by name
/// from their parent directory.
pub(crate) fn split_target(working: &Path) -> (PathBuf, String) {
  if probe::is_dir(working) {
    return (working.to_path_buf(), ".".to_string());
  }

  let parent = working
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("."));
  let file = working
    .file_name()
    .map(|name| name.to_string_lossy().to_string())
    .unwrap_or_else(|| ".".to_string());

  (parent, file)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn test_split_target() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("todo.txt");
    std::fs::write(&file, "").unwrap();

    assert_eq!(split_target(temp.path()), (temp.path().to_path_buf(), ".".to_string()));
    assert_eq!(split_target(&file), (temp.path().to_path_buf(), "todo.txt".to_string()));
  }
}

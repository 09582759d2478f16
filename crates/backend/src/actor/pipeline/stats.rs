//! Statistics stage - the last stop of every domain in a run.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use super::stream::MessageStream;
use crate::{
  actor::message::{BackedUpDomain, DomainResult},
  domain::{Domain, Repository},
  protocol::{Action, ControlMessage},
};

#[derive(Debug, thiserror::Error)]
#[error("failed to gather statistics: {0}")]
pub struct StatsError(pub String);

/// Gathers repository statistics for a freshly backed up domain
#[async_trait]
pub trait StatsCollector: Send + Sync {
  async fn collect(&self, group: &str, domain: &Domain, repository: &Repository) -> Result<(), StatsError>;
}

/// Collector that gathers nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStats;

#[async_trait]
impl StatsCollector for NoopStats {
  async fn collect(&self, _group: &str, _domain: &Domain, _repository: &Repository) -> Result<(), StatsError> {
    Ok(())
  }
}

/// What every statistics worker shares
#[derive(Clone)]
pub struct StatsContext {
  pub group: String,
  pub repository: Repository,
  pub collector: Arc<dyn StatsCollector>,
  pub stream: MessageStream,
}

/// Statistics worker - collects stats for backed up domains and records the
/// final result of every domain.
///
/// Runs until the backup stage is exhausted, even after cancellation, so the
/// results of domains still in flight are kept. Statistics are not gathered
/// once cancelled.
pub async fn stats_worker(
  worker_id: usize,
  ctx: StatsContext,
  rx: Arc<tokio::sync::Mutex<mpsc::Receiver<BackedUpDomain>>>,
  results: mpsc::UnboundedSender<DomainResult>,
  cancel: CancellationToken,
) {
  trace!(worker_id, "Stats worker starting");
  let mut processed = 0;

  loop {
    let msg = rx.lock().await.recv().await;

    match msg {
      Some(BackedUpDomain::Domain { domain, outcome }) => {
        if outcome.was_backed_up() && !cancel.is_cancelled() {
          gather(&ctx, &domain).await;
        }
        processed += 1;

        let _ = results.send(DomainResult {
          domain: domain.name.clone(),
          outcome,
        });
      }
      Some(BackedUpDomain::Done) | None => {
        trace!(worker_id, processed, "Stats worker: input exhausted");
        break;
      }
    }
  }

  trace!(worker_id, processed, "Stats worker finished");
}

async fn gather(ctx: &StatsContext, domain: &Domain) {
  let control = |action| ControlMessage::new(&ctx.group, &domain.name, action).to_line();

  ctx.stream.send_block([control(Action::GatheringStats)]).await;
  if let Err(e) = ctx.collector.collect(&ctx.group, domain, &ctx.repository).await {
    warn!(domain = %domain.name, error = %e, "Failed to gather statistics");
  }
  ctx.stream.send_block([control(Action::GatheringStatsDone)]).await;
}

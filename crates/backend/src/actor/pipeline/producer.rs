//! Producer stage - enqueues the domains of a run for the backup workers.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{actor::message::PipelineDomain, domain::Domain};

pub async fn producer_stage(domains: Vec<Domain>, tx: mpsc::Sender<PipelineDomain>, cancel: CancellationToken) {
  let total = domains.len();
  debug!(total, "Producer stage starting");

  for (i, domain) in domains.into_iter().enumerate() {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        // Closing the channel ends the backup workers once they drain it
        debug!(produced = i, total, "Producer cancelled");
        return;
      }
      result = tx.send(PipelineDomain::Domain(Box::new(domain))) => {
        if result.is_err() {
          debug!(produced = i, "Producer: downstream closed");
          break;
        }
      }
    }
  }

  let _ = tx.send(PipelineDomain::Done).await;
  debug!(total, "Producer stage complete");
}

//! Backup Pipeline
//!
//! Backs up every eligible domain of a group to one repository:
//!
//! ```text
//! Producer → Backup workers (N) → Statistics workers (M) → PipelineReport
//!                  │                       │
//!                  └──────── messages ─────┘
//! ```
//!
//! Stages are connected by bounded channels. Every worker writes to the shared
//! `messages` stream; see [`stream`] for how a domain's lines stay together.
//!
//! The stream of a run looks like:
//!
//! ```text
//! not_this_repo (per out-of-scope domain)
//! begin, restic lines...         (per domain)  or  unavailable
//! gathering_stats, gathering_stats_done        (per backed up domain)
//! done
//! ```

mod backup;
mod producer;
mod stats;
mod stream;

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use self::{
  stats::{NoopStats, StatsCollector, StatsError},
  stream::MessageStream,
};
use self::{
  backup::{BackupContext, backup_done_aggregator, backup_worker},
  producer::producer_stage,
  stats::{StatsContext, stats_worker},
};
use crate::{
  actor::message::{BackupOutcome, DomainResult},
  domain::{Domain, Group, RegistryError, config::BackupConfig},
  protocol::{Action, ControlMessage},
  restic::{BackupRunner, Session},
};

/// Worker counts and channel sizes of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
  pub backup_workers: usize,
  pub stats_workers: usize,
  pub domain_buffer: usize,
}

impl PipelineConfig {
  pub fn from_config(config: &BackupConfig) -> Self {
    Self {
      backup_workers: config.backup_workers.max(1),
      stats_workers: config.stats_workers.max(1),
      domain_buffer: config.domain_buffer.max(1),
    }
  }
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self::from_config(&BackupConfig::default())
  }
}

/// The domains of a group, split by whether they back up to a repository
#[derive(Debug, Clone)]
pub struct BackupPlan {
  pub group: String,
  pub domains: Vec<Domain>,
  pub skipped: Vec<Domain>,
}

impl BackupPlan {
  pub fn resolve(group: &Group, repository: &str) -> Result<Self, RegistryError> {
    let (domains, skipped) = group
      .domains()?
      .into_iter()
      .partition(|domain| domain.repositories.includes(repository));

    Ok(Self {
      group: group.name.clone(),
      domains,
      skipped,
    })
  }
}

/// Result of running the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
  /// Every domain that went through the pipeline, sorted by name
  pub results: Vec<DomainResult>,
  /// Domains left out because they do not back up to this repository
  pub skipped: Vec<String>,
}

impl PipelineReport {
  pub fn succeeded(&self) -> usize {
    self.results.iter().filter(|r| r.outcome.is_success()).count()
  }

  pub fn unavailable(&self) -> usize {
    self
      .results
      .iter()
      .filter(|r| r.outcome == BackupOutcome::Unavailable)
      .count()
  }

  /// Domains where restic failed to run or exited non-zero
  pub fn failed(&self) -> usize {
    self.results.len() - self.succeeded() - self.unavailable()
  }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  #[error("Registry error: {0}")]
  Registry(#[from] RegistryError),
  #[error("Pipeline task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Run a backup of every domain in `plan`.
///
/// Blocks until every worker has finished, then emits `done` on `messages`.
/// On cancellation no further domains are started, domains already running
/// complete and are reported, and `done` is still the last line.
pub async fn run_pipeline(
  plan: BackupPlan,
  session: Arc<Session>,
  runner: Arc<dyn BackupRunner>,
  collector: Arc<dyn StatsCollector>,
  messages: mpsc::UnboundedSender<String>,
  config: PipelineConfig,
  cancel: CancellationToken,
) -> Result<PipelineReport, PipelineError> {
  let BackupPlan { group, domains, skipped } = plan;
  let domain_count = domains.len();
  let stream = MessageStream::new(messages);

  info!(
    group = %group,
    repository = %session.repository.name,
    domains = domain_count,
    skipped = skipped.len(),
    "Starting backup pipeline"
  );

  stream
    .send_block(
      skipped
        .iter()
        .map(|domain| ControlMessage::new(&group, &domain.name, Action::NotThisRepo).to_line()),
    )
    .await;

  // Create channels between stages
  let (producer_tx, producer_rx) = mpsc::channel(config.domain_buffer);
  let (backup_tx, backup_rx) = mpsc::channel(config.domain_buffer);
  let (results_tx, mut results_rx) = mpsc::unbounded_channel();

  // Wrap receivers in Arc<Mutex> for sharing among workers
  let producer_rx = Arc::new(Mutex::new(producer_rx));
  let backup_rx = Arc::new(Mutex::new(backup_rx));

  // Done signal channel for the backup worker pool
  let (backup_done_tx, backup_done_rx) = mpsc::channel(config.backup_workers);

  let pipeline_cancel = cancel.child_token();

  // Spawn producer stage
  let producer_cancel = pipeline_cancel.clone();
  let producer = tokio::spawn(async move {
    producer_stage(domains, producer_tx, producer_cancel).await;
  });

  // Spawn backup workers
  let backup_ctx = BackupContext {
    group: group.clone(),
    session: session.clone(),
    runner,
    stream: stream.clone(),
  };
  let backup_workers: Vec<_> = (0..config.backup_workers)
    .map(|worker_id| {
      let ctx = backup_ctx.clone();
      let rx = producer_rx.clone();
      let tx = backup_tx.clone();
      let done_tx = backup_done_tx.clone();
      let cancel = pipeline_cancel.clone();
      tokio::spawn(async move {
        backup_worker(worker_id, ctx, rx, tx, done_tx, cancel).await;
      })
    })
    .collect();
  drop(backup_done_tx);
  drop(producer_rx);

  // Spawn backup done aggregator
  let backup_final_tx = backup_tx.clone();
  tokio::spawn(async move {
    backup_done_aggregator(config.backup_workers, backup_done_rx, backup_final_tx).await;
  });
  drop(backup_tx);

  // Spawn statistics workers
  let stats_ctx = StatsContext {
    group: group.clone(),
    repository: session.repository.clone(),
    collector,
    stream: stream.clone(),
  };
  let stats_workers: Vec<_> = (0..config.stats_workers)
    .map(|worker_id| {
      let ctx = stats_ctx.clone();
      let rx = backup_rx.clone();
      let results = results_tx.clone();
      let cancel = pipeline_cancel.clone();
      tokio::spawn(async move {
        stats_worker(worker_id, ctx, rx, results, cancel).await;
      })
    })
    .collect();
  drop(results_tx);
  drop(backup_rx);

  // Wait for every stage. Domains in flight finish even when cancelled.
  producer.await?;
  for finished in join_all(backup_workers).await {
    finished?;
  }
  for finished in join_all(stats_workers).await {
    finished?;
  }

  let mut results = Vec::with_capacity(domain_count);
  while let Some(result) = results_rx.recv().await {
    results.push(result);
  }
  results.sort_by(|a, b| a.domain.cmp(&b.domain));

  stream
    .send_block([ControlMessage::new(&group, "", Action::Done).to_line()])
    .await;

  let report = PipelineReport {
    results,
    skipped: skipped.into_iter().map(|domain| domain.name).collect(),
  };

  debug!(
    group = %group,
    succeeded = report.succeeded(),
    unavailable = report.unavailable(),
    failed = report.failed(),
    "Pipeline complete"
  );

  Ok(report)
}

/// Tracks "Done" signals across multiple workers
#[derive(Debug)]
pub struct DoneTracker {
  expected: usize,
  received: usize,
}

impl DoneTracker {
  pub fn new(worker_count: usize) -> Self {
    Self {
      expected: worker_count,
      received: 0,
    }
  }

  /// Record a Done signal. Returns true if this was the last one.
  pub fn record_done(&mut self) -> bool {
    self.received += 1;
    self.received >= self.expected
  }
}

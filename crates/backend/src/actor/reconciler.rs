use std::{sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::mount::{count_mounted, is_mounted};
use crate::{
  domain::{
    Domain, Group, Registry,
    config::{Config, PlaceholderConfig},
  },
  state::{DomainState, StateError, Transition},
};

/// Reconciler configuration, taken from the `[daemon]` and `[placeholder]`
/// config sections.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
  /// Time between ticks
  pub interval: Duration,
  /// Entries ignored when deciding whether a placeholder is empty
  pub placeholder: PlaceholderConfig,
}

impl ReconcilerConfig {
  pub fn from_config(config: &Config) -> Self {
    Self {
      interval: Duration::from_secs(config.daemon.interval_secs.max(1)),
      placeholder: config.placeholder.clone(),
    }
  }
}

impl Default for ReconcilerConfig {
  fn default() -> Self {
    Self::from_config(&Config::default())
  }
}

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
  pub groups: usize,
  pub mounted: usize,
  pub domains: usize,
  /// Steps that changed something on disk
  pub changes: usize,
  /// Steps that failed and will be retried next tick
  pub failures: usize,
}

/// Periodic filesystem housekeeping for every domain of every group.
///
/// Each tick reloads groups and domains from disk, then per domain:
///
/// 1. Symlinked domains are linked to their proxy while the source is
///    available, and unlinked once it is gone. Independent of mount state.
/// 2. In a mounted group, placeholders are created and `__recover__` linked.
/// 3. Otherwise, only while no group at all is mounted, `__recover__` links
///    are removed and placeholders released or demoted.
///
/// All state lives on disk, so a restarted reconciler picks up where the last
/// one stopped. A failed step is logged and retried on the next tick.
pub struct Reconciler {
  registry: Registry,
  config: ReconcilerConfig,
}

impl Reconciler {
  pub fn new(registry: Registry, config: ReconcilerConfig) -> Self {
    Self { registry, config }
  }

  /// Run ticks until cancelled. The first tick runs immediately.
  pub async fn run(self, cancel: CancellationToken) {
    let mut timer = interval(self.config.interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
      root = %self.registry.root().display(),
      interval_secs = self.config.interval.as_secs(),
      "Reconciler started"
    );

    let this = Arc::new(self);

    loop {
      tokio::select! {
          biased;

          _ = cancel.cancelled() => {
              info!("Reconciler shutting down (cancelled)");
              break;
          }

          _ = timer.tick() => {
              let reconciler = this.clone();
              match tokio::task::spawn_blocking(move || reconciler.tick()).await {
                  Ok(report) => trace!(?report, "Reconciliation tick complete"),
                  Err(e) => error!(error = %e, "Reconciliation tick panicked"),
              }
          }
      }
    }

    info!("Reconciler stopped");
  }

  /// Run a single reconciliation pass over all groups
  pub fn tick(&self) -> TickReport {
    let mut report = TickReport::default();

    let groups = match self.registry.groups() {
      Ok(groups) => groups,
      Err(e) => {
        warn!(error = %e, "Failed to list groups");
        report.failures += 1;
        return report;
      }
    };

    let mounted = count_mounted(&groups);
    report.groups = groups.len();
    report.mounted = mounted;

    for group in &groups {
      let group_mounted = is_mounted(group);

      for domain in self.load_domains(group, &mut report) {
        report.domains += 1;
        self.reconcile_domain(group, &domain, group_mounted, mounted, &mut report);
      }
    }

    report
  }

  /// Load every readable domain record of a group; bad records are skipped
  fn load_domains(&self, group: &Group, report: &mut TickReport) -> Vec<Domain> {
    let names = match group.domain_names() {
      Ok(names) => names,
      Err(e) => {
        warn!(group = %group.name, error = %e, "Failed to list domains");
        report.failures += 1;
        return Vec::new();
      }
    };

    names
      .iter()
      .filter_map(|name| match group.domain(name) {
        Ok(domain) => Some(domain),
        Err(e) => {
          warn!(group = %group.name, domain = %name, error = %e, "Skipping unreadable domain");
          report.failures += 1;
          None
        }
      })
      .collect()
  }

  fn reconcile_domain(
    &self,
    group: &Group,
    domain: &Domain,
    group_mounted: bool,
    mounted: usize,
    report: &mut TickReport,
  ) {
    let state = DomainState::new(domain, &self.config.placeholder);

    if let Some(ref symlink) = domain.symlink {
      let step = if symlink.is_available() {
        state.link_to_proxy_if_eligible()
      } else {
        state.unlink_from_proxy_if_source_gone()
      };
      record(group, domain, step, report);
    }

    if group_mounted {
      if !record(group, domain, state.ensure_writable_path_exists(), report) {
        return;
      }
      if !state.recovery_view_linked() {
        record(
          group,
          domain,
          state.link_to_backup_recovery_view(&group.mountpoint()),
          report,
        );
      }
    } else if mounted == 0 {
      // A leftover `__recover__` would make the placeholder look non-empty
      if state.recovery_view_linked() && !record(group, domain, state.unlink_backup_recovery_view(), report) {
        return;
      }
      record(group, domain, state.release_if_temporary_and_empty(), report);
    }
  }
}

/// Log the outcome of a step. Returns false if it failed.
fn record(group: &Group, domain: &Domain, step: Result<Transition, StateError>, report: &mut TickReport) -> bool {
  match step {
    Ok(Transition::Unchanged) => true,
    Ok(transition) => {
      debug!(group = %group.name, domain = %domain.name, ?transition, "Domain transitioned");
      report.changes += 1;
      true
    }
    Err(e) => {
      warn!(group = %group.name, error = %e, "Reconciliation step failed, retrying next tick");
      report.failures += 1;
      false
    }
  }
}

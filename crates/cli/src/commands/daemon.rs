//! Daemon command

use anyhow::Result;
use dfb::{Daemon, RuntimeConfig};
use tracing::info;

/// Run the reconciliation daemon until ctrl-c or SIGTERM
pub async fn cmd_daemon(runtime: RuntimeConfig) -> Result<()> {
  info!(
    interval_secs = runtime.config.daemon.interval_secs,
    foreground = runtime.foreground,
    "Starting dfb daemon"
  );
  Daemon::new(runtime).run().await;
  Ok(())
}

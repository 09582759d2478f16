//! Reconciliation daemon lifecycle.
//!
//! ```text
//! Daemon (Supervisor)
//!   └── Reconciler (one tick every `daemon.interval_secs`)
//! ```
//!
//! # Lifecycle
//!
//! 1. Create master `CancellationToken`
//! 2. Spawn the `Reconciler` with a child token
//! 3. Wait for ctrl-c or SIGTERM
//! 4. Cancel and wait for the reconciler to finish its current tick

use std::path::PathBuf;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
  actor::{Reconciler, ReconcilerConfig},
  dirs,
  domain::{Registry, config::Config},
};

// ============================================================================
// Configuration
// ============================================================================

/// Daemon runtime configuration.
///
/// Built from the default directories and the config file in the root
/// directory. Everything the daemon reads is in here.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Registry root, eg. ~/.dfb
  pub root: PathBuf,
  /// Where new domains are created
  pub home: PathBuf,
  /// Log files
  pub data_dir: PathBuf,
  /// Log to the console instead of files
  pub foreground: bool,
  pub config: Config,
}

impl RuntimeConfig {
  pub fn load() -> Self {
    let root = dirs::default_root_dir();
    Self::ensure_config(&root);
    let config = Config::load(&root);

    Self {
      root,
      home: dirs::default_home_dir(),
      data_dir: dirs::default_data_dir(),
      foreground: false,
      config,
    }
  }

  /// Write the default config file on first run
  fn ensure_config(root: &std::path::Path) {
    let path = Config::path(root);
    if path.exists() {
      return;
    }

    if let Err(e) = std::fs::create_dir_all(root) {
      warn!("Failed to create root directory: {}", e);
      return;
    }

    match std::fs::write(&path, Config::generate_template()) {
      Ok(()) => info!("Created config: {:?}", path),
      Err(e) => warn!("Failed to create config: {}", e),
    }
  }

  pub fn registry(&self) -> Registry {
    Registry::new(&self.root, &self.home)
  }
}

/// The dfb daemon: keeps domain paths, placeholders and recovery links in
/// line with mount state and symlink source availability.
pub struct Daemon {
  runtime_config: RuntimeConfig,
}

impl Daemon {
  pub fn new(runtime_config: RuntimeConfig) -> Self {
    Self { runtime_config }
  }

  pub fn with_defaults() -> Self {
    Self::new(RuntimeConfig::load())
  }

  /// Run until ctrl-c or SIGTERM
  pub async fn run(self) {
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
      wait_for_shutdown_signal().await;
      cancel_for_signal.cancel();
    });

    self.run_until(cancel).await;
  }

  /// Run until `cancel` is cancelled
  pub async fn run_until(self, cancel: CancellationToken) {
    info!("Starting dfb daemon");
    info!("Root: {:?}", self.runtime_config.root);
    info!("Home: {:?}", self.runtime_config.home);

    let reconciler = Reconciler::new(
      self.runtime_config.registry(),
      ReconcilerConfig::from_config(&self.runtime_config.config),
    );

    let reconciler_handle = tokio::spawn(reconciler.run(cancel.child_token()));

    cancel.cancelled().await;
    info!("Shutting down...");

    if let Err(e) = reconciler_handle.await {
      warn!("Reconciler task failed: {}", e);
    }

    info!("Daemon stopped");
  }
}

async fn wait_for_shutdown_signal() {
  #[cfg(unix)]
  {
    let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(terminate) => terminate,
      Err(e) => {
        warn!("Failed to listen for SIGTERM: {}", e);
        if let Err(e) = signal::ctrl_c().await {
          warn!("Failed to listen for ctrl-c: {}", e);
        }
        return;
      }
    };

    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Received ctrl-c, shutting down..."),
            Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
        },
        _ = terminate.recv() => info!("Received SIGTERM, shutting down..."),
    }
  }

  #[cfg(not(unix))]
  {
    match signal::ctrl_c().await {
      Ok(()) => info!("Received ctrl-c, shutting down..."),
      Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
    }
  }
}

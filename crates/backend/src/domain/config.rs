//! Configuration for the reconciliation daemon and backup runs.
//!
//! Loaded from `<root>/config.toml`. Every section falls back to its defaults,
//! so an empty or partial file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// File name of the config file inside the root directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

// ============================================================================
// Daemon Configuration
// ============================================================================

/// Reconciliation daemon settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  /// Seconds between reconciliation ticks (default: 2)
  pub interval_secs: u64,

  /// Log level: error, warn, info, debug, trace (default: info)
  pub log_level: String,

  /// Log file rotation: daily, hourly, never (default: daily)
  pub log_rotation: String,
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      interval_secs: 2,
      log_level: "info".to_string(),
      log_rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Backup Configuration
// ============================================================================

/// Backup pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
  /// Restic executable, looked up in PATH when not absolute (default: restic)
  pub restic_binary: String,

  /// Number of concurrent backup workers (default: 2)
  pub backup_workers: usize,

  /// Number of concurrent statistics workers (default: 2)
  pub stats_workers: usize,

  /// Capacity of the domain channels between stages (default: 16)
  pub domain_buffer: usize,

  /// Per-domain backup timeout in seconds. Unset means no timeout.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_secs: Option<u64>,

  /// Directory for exclusion files. Unset means the OS temp dir.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub temp_dir: Option<PathBuf>,
}

impl Default for BackupConfig {
  fn default() -> Self {
    Self {
      restic_binary: "restic".to_string(),
      backup_workers: 2,
      stats_workers: 2,
      domain_buffer: 16,
      timeout_secs: None,
      temp_dir: None,
    }
  }
}

// ============================================================================
// Placeholder Configuration
// ============================================================================

/// Placeholder housekeeping settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
  /// Entry names that do not count as content when deciding whether a
  /// temporary placeholder is empty (default: [".DS_Store"])
  pub ignored_entries: Vec<String>,
}

impl Default for PlaceholderConfig {
  fn default() -> Self {
    Self {
      ignored_entries: vec![".DS_Store".to_string()],
    }
  }
}

// ============================================================================
// Root Configuration
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub daemon: DaemonConfig,
  pub backup: BackupConfig,
  pub placeholder: PlaceholderConfig,
}

impl Config {
  /// Load the config file from the root directory, falling back to defaults
  pub fn load(root: &Path) -> Self {
    let path = Self::path(root);
    if !path.exists() {
      return Self::default();
    }

    match std::fs::read_to_string(&path) {
      Ok(content) => match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
          warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
          Self::default()
        }
      },
      Err(e) => {
        warn!(path = %path.display(), error = %e, "Failed to read config, using defaults");
        Self::default()
      }
    }
  }

  /// Get the config file path for a root directory
  pub fn path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    let defaults = Self::default();
    format!(
      r#"# dfb configuration
# Place in ~/.dfb/config.toml (or $DFB_DIR/config.toml)

# ============================================================================
# Reconciliation Daemon
# ============================================================================

[daemon]
# Seconds between reconciliation ticks
interval_secs = {interval}

# Log level: error, warn, info, debug, trace (RUST_LOG overrides)
log_level = "{log_level}"

# Log file rotation when running in the background: daily, hourly, never
log_rotation = "{log_rotation}"

# ============================================================================
# Backups
# ============================================================================

[backup]
# Restic executable
restic_binary = "{restic}"

# Concurrent backup workers
backup_workers = {backup_workers}

# Concurrent statistics workers
stats_workers = {stats_workers}

# Capacity of the channels between pipeline stages
domain_buffer = {domain_buffer}

# Kill a domain's backup after this many seconds (no timeout when unset)
# timeout_secs = 7200

# Directory for exclusion files (OS temp dir when unset)
# temp_dir = "/tmp"

# ============================================================================
# Placeholders
# ============================================================================

[placeholder]
# Entries that do not count as content of a temporary placeholder
ignored_entries = [{ignored}]
"#,
      interval = defaults.daemon.interval_secs,
      log_level = defaults.daemon.log_level,
      log_rotation = defaults.daemon.log_rotation,
      restic = defaults.backup.restic_binary,
      backup_workers = defaults.backup.backup_workers,
      stats_workers = defaults.backup.stats_workers,
      domain_buffer = defaults.backup.domain_buffer,
      ignored = defaults
        .placeholder
        .ignored_entries
        .iter()
        .map(|e| format!("\"{}\"", e))
        .collect::<Vec<_>>()
        .join(", "),
    )
  }
}

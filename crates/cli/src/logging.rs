//! Logging setup for CLI commands and the daemon

use std::path::Path;

use dfb::config::DaemonConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "dfb.log";

/// Console logging for one-shot commands
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy(),
    )
    .with_target(false)
    .init();
}

fn parse_log_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Initialize daemon logging from `[daemon]` config.
///
/// Foreground mode logs to the console with colors, background mode to a
/// rolling file in `log_dir`. `RUST_LOG` overrides the configured level.
///
/// The returned guard must be kept alive for as long as the daemon runs.
pub fn init_daemon_logging(foreground: bool, config: &DaemonConfig, log_dir: &Path) -> Option<WorkerGuard> {
  let env_filter = EnvFilter::builder()
    .with_default_directive(parse_log_level(&config.log_level).into())
    .from_env_lossy();

  if foreground {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_ansi(true)
      .init();
    return None;
  }

  if std::fs::create_dir_all(log_dir).is_err() {
    init_cli_logging();
    return None;
  }

  let file_appender = match config.log_rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(log_dir, LOG_FILE_NAME),
    "never" => tracing_appender::rolling::never(log_dir, LOG_FILE_NAME),
    _ => tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME),
  };
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}

//! Backup command: run every domain of a group against one repository

use std::{
  io::{self, Write},
  sync::Arc,
};

use anyhow::{Context, Result, bail};
use crossterm::{
  event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
  terminal::{disable_raw_mode, enable_raw_mode},
};
use dfb::{
  RuntimeConfig,
  actor::{
    message::BackupOutcome,
    pipeline::{BackupPlan, NoopStats, PipelineConfig, run_pipeline},
  },
  protocol::MessageRouter,
  restic::{BackupRunner, PASSWORD_ENV, Password, ResticRunner, Session},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::format::ProgressPrinter;

pub async fn cmd_backup(group_name: &str, repository_name: &str) -> Result<()> {
  let runtime = RuntimeConfig::load();
  let registry = runtime.registry();

  let group = registry.group(group_name).context("Cannot start backup")?;
  let repository = group.repository(repository_name).context("Cannot start backup")?;
  let plan = BackupPlan::resolve(&group, &repository.name).context("Cannot start backup")?;

  let password = match Password::from_env() {
    Some(password) => password,
    None => {
      let prompt = format!("Password for {}: ", repository.name);
      tokio::task::spawn_blocking(move || prompt_password(&prompt))
        .await?
        .with_context(|| format!("Failed to read password (or set ${})", PASSWORD_ENV))?
    }
  };

  let runner: Arc<dyn BackupRunner> = Arc::new(ResticRunner::from_config(&runtime.config.backup));
  let session = Session::open(runner.as_ref(), repository, password)
    .await
    .context("Failed to open repository")?;

  let cancel = CancellationToken::new();
  let cancel_on_signal = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("Interrupted, finishing running domains");
      cancel_on_signal.cancel();
    }
  });

  let (tx, rx) = mpsc::unbounded_channel();
  let router = tokio::spawn(MessageRouter::new().with(ProgressPrinter::stdout()).run(rx));

  let report = run_pipeline(
    plan,
    Arc::new(session),
    runner,
    Arc::new(NoopStats),
    tx,
    PipelineConfig::from_config(&runtime.config.backup),
    cancel,
  )
  .await
  .context("Backup failed")?;
  router.await?;

  info!(
    succeeded = report.succeeded(),
    unavailable = report.unavailable(),
    failed = report.failed(),
    skipped = report.skipped.len(),
    "Backup finished"
  );

  if report.failed() > 0 {
    let failed: Vec<&str> = report
      .results
      .iter()
      .filter(|r| !r.outcome.is_success() && r.outcome != BackupOutcome::Unavailable)
      .map(|r| r.domain.as_str())
      .collect();
    bail!("{} domain(s) failed: {}", failed.len(), failed.join(", "));
  }
  Ok(())
}

/// Read a line from the terminal without echoing it
fn prompt_password(prompt: &str) -> io::Result<Password> {
  let mut stderr = io::stderr();
  write!(stderr, "{}", prompt)?;
  stderr.flush()?;

  enable_raw_mode()?;
  let input = read_hidden_line();
  disable_raw_mode()?;
  writeln!(stderr)?;

  input.map(Password::new)
}

fn read_hidden_line() -> io::Result<String> {
  let mut input = String::new();
  loop {
    let Event::Key(KeyEvent {
      code, modifiers, kind, ..
    }) = event::read()?
    else {
      continue;
    };
    if kind != KeyEventKind::Press {
      continue;
    }

    match code {
      KeyCode::Enter => return Ok(input),
      KeyCode::Backspace => {
        input.pop();
      }
      KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
        return Err(io::Error::new(io::ErrorKind::Interrupted, "password prompt cancelled"));
      }
      KeyCode::Esc => {
        return Err(io::Error::new(io::ErrorKind::Interrupted, "password prompt cancelled"));
      }
      KeyCode::Char(c) => input.push(c),
      _ => {}
    }
  }
}

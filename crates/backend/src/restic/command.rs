//! Restic invocation
//!
//! ```text
//! restic -r <repo> backup <target> --tag <domain> --exclude-file <file> --verbose --json
//! restic -r <repo> key list --json
//! ```
//!
//! The password is always written to stdin, never passed as an argument.

use std::{
  path::{Path, PathBuf},
  process::{ExitStatus, Stdio},
  time::Duration,
};

use async_trait::async_trait;
use tokio::{
  io::{AsyncWriteExt, BufReader},
  process::{Child, Command},
  sync::mpsc,
  time::timeout,
};
use tracing::{debug, trace, warn};

use super::{BackupRequest, BackupRunner, Password, Result, RunnerError};
use crate::{
  domain::{Repository, config::BackupConfig},
  protocol::lines::read_line,
};

/// [`BackupRunner`] backed by the restic binary
#[derive(Debug, Clone)]
pub struct ResticRunner {
  binary: String,
  temp_dir: PathBuf,
  timeout: Option<Duration>,
}

impl ResticRunner {
  pub fn new(binary: impl Into<String>) -> Self {
    Self {
      binary: binary.into(),
      temp_dir: crate::dirs::default_temp_dir(),
      timeout: None,
    }
  }

  pub fn from_config(config: &BackupConfig) -> Self {
    let mut runner = Self::new(&config.restic_binary);
    if let Some(ref dir) = config.temp_dir {
      runner.temp_dir = dir.clone();
    }
    runner.timeout = config.timeout_secs.map(Duration::from_secs);
    runner
  }

  pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.temp_dir = dir.into();
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// `dfb_exclusions_<domain>_<unix-seconds>` in the temp dir
  pub fn exclusion_file_path(&self, domain: &str) -> PathBuf {
    self
      .temp_dir
      .join(format!("dfb_exclusions_{}_{}", domain, chrono::Utc::now().timestamp()))
  }

  /// Write one pattern per line, replacing a stale file of the same name
  fn write_exclusions(&self, domain: &str, exclusions: &[String]) -> Result<PathBuf> {
    let path = self.exclusion_file_path(domain);
    let to_error = |source| RunnerError::ExclusionFile {
      path: path.clone(),
      source,
    };

    if path.exists() {
      std::fs::remove_file(&path).map_err(to_error)?;
    }

    let mut content = exclusions.join("\n");
    content.push('\n');
    std::fs::write(&path, content).map_err(to_error)?;

    trace!(path = %path.display(), patterns = exclusions.len(), "Wrote exclusion file");
    Ok(path)
  }

  fn command(&self, repository: &Repository) -> Command {
    let mut cmd = Command::new(&self.binary);
    cmd.arg("-r").arg(&repository.locator);
    cmd.stdin(Stdio::piped()).kill_on_drop(true);
    cmd
  }

  fn spawn(&self, mut cmd: Command) -> Result<Child> {
    cmd.spawn().map_err(|source| RunnerError::Spawn {
      binary: self.binary.clone(),
      source,
    })
  }

  async fn run_backup(
    &self,
    request: &BackupRequest,
    password: &Password,
    exclude_file: &Path,
    lines: &mpsc::UnboundedSender<String>,
  ) -> Result<i32> {
    let mut cmd = self.command(&request.repository);
    cmd
      .arg("backup")
      .arg(&request.target)
      .arg("--tag")
      .arg(&request.domain)
      .arg("--exclude-file")
      .arg(exclude_file)
      .arg("--verbose")
      .arg("--json")
      .current_dir(&request.working_dir)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    debug!(
      domain = %request.domain,
      repository = %request.repository.name,
      working_dir = %request.working_dir.display(),
      target = %request.target,
      "Starting restic backup"
    );

    let mut child = self.spawn(cmd)?;
    write_password(&mut child, password).await?;

    let status = match self.timeout {
      Some(limit) => {
        let forwarded = timeout(limit, forward_output(&mut child, lines)).await;
        match forwarded {
          Ok(status) => status?,
          Err(_) => {
            warn!(
              domain = %request.domain,
              timeout_secs = limit.as_secs(),
              "Backup timed out, killing restic"
            );
            if let Err(e) = child.kill().await {
              warn!(domain = %request.domain, error = %e, "Failed to kill restic");
            }
            return Err(RunnerError::Timeout(limit.as_secs()));
          }
        }
      }
      None => forward_output(&mut child, lines).await?,
    };

    Ok(status.code().unwrap_or(-1))
  }
}

#[async_trait]
impl BackupRunner for ResticRunner {
  async fn backup(
    &self,
    request: &BackupRequest,
    password: &Password,
    lines: &mpsc::UnboundedSender<String>,
  ) -> Result<i32> {
    let exclude_file = self.write_exclusions(&request.domain, &request.exclusions)?;
    let result = self.run_backup(request, password, &exclude_file, lines).await;

    if let Err(e) = tokio::fs::remove_file(&exclude_file).await {
      debug!(path = %exclude_file.display(), error = %e, "Failed to remove exclusion file");
    }

    result
  }

  async fn verify_password(&self, repository: &Repository, password: &Password) -> Result<bool> {
    let mut cmd = self.command(repository);
    cmd
      .arg("key")
      .arg("list")
      .arg("--json")
      .stdout(Stdio::null())
      .stderr(Stdio::null());

    let mut child = self.spawn(cmd)?;
    write_password(&mut child, password).await?;
    let status = child.wait().await?;

    trace!(repository = %repository.name, success = status.success(), "Checked repository password");
    Ok(status.success())
  }
}

/// A child that exits without reading stdin is not an error here; its exit
/// status tells what went wrong.
async fn write_password(child: &mut Child, password: &Password) -> Result<()> {
  if let Some(mut stdin) = child.stdin.take() {
    match stdin.write_all(password.expose().as_bytes()).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
        debug!("Restic exited before reading the password");
      }
      Err(e) => return Err(e.into()),
    }
    drop(stdin);
  }
  Ok(())
}

/// Forward stdout and stderr line by line as they arrive, then wait for exit
async fn forward_output(child: &mut Child, lines: &mpsc::UnboundedSender<String>) -> Result<ExitStatus> {
  let stdout = child
    .stdout
    .take()
    .ok_or_else(|| std::io::Error::other("stdout not piped"))?;
  let stderr = child
    .stderr
    .take()
    .ok_or_else(|| std::io::Error::other("stderr not piped"))?;

  let mut stdout = BufReader::new(stdout);
  let mut stderr = BufReader::new(stderr);
  let (mut stdout_buf, mut stderr_buf) = (Vec::new(), Vec::new());
  let (mut stdout_open, mut stderr_open) = (true, true);

  while stdout_open || stderr_open {
    tokio::select! {
        line = read_line(&mut stdout, &mut stdout_buf), if stdout_open => match line? {
            Some(line) => { let _ = lines.send(line); }
            None => stdout_open = false,
        },
        line = read_line(&mut stderr, &mut stderr_buf), if stderr_open => match line? {
            Some(line) => { let _ = lines.send(line); }
            None => stderr_open = false,
        },
    }
  }

  Ok(child.wait().await?)
}

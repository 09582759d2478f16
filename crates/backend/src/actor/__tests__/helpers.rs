//! Test helpers for actor integration tests.
//!
//! Provides `TestContext`, which lays out a registry root and a home directory
//! in temporary directories, and `ScriptedRunner`, a `BackupRunner` that plays
//! back canned restic output.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::{
  actor::{Reconciler, ReconcilerConfig},
  domain::{Domain, DomainRecord, Group, Registry, Repository},
  restic::{BackupRequest, BackupRunner, Password, RunnerError},
  state::probe,
};

/// Temporary registry root and home directory.
pub struct TestContext {
  pub temp: TempDir,
  pub registry: Registry,
}

impl TestContext {
  pub fn new() -> Self {
    let temp = TempDir::new().expect("create temp dir");
    let root = temp.path().join("dfb");
    let home = temp.path().join("home");
    std::fs::create_dir_all(&root).expect("create root");
    std::fs::create_dir_all(&home).expect("create home");

    Self {
      registry: Registry::new(root, home),
      temp,
    }
  }

  pub fn group(&self, name: &str) -> Group {
    match self.registry.group(name) {
      Ok(group) => group,
      Err(_) => self.registry.create_group(name).expect("create group"),
    }
  }

  pub fn home_path(&self, name: &str) -> PathBuf {
    self.registry.home().join(name)
  }

  /// Where symlink sources live, standing in for removable media
  pub fn source_path(&self, name: &str) -> PathBuf {
    self.temp.path().join("external").join(name)
  }

  pub fn add_domain(&self, group: &str, name: &str) -> Domain {
    self.group(group).add_domain(name, None).expect("add domain")
  }

  /// Add a symlinked domain. The source is created so the proxy can be made.
  pub fn add_symlinked_domain(&self, group: &str, name: &str) -> Domain {
    let source = self.source_path(name);
    std::fs::create_dir_all(&source).expect("create source");
    self
      .group(group)
      .add_domain(name, Some(source))
      .expect("add symlinked domain")
  }

  /// Write a domain record by hand, for paths outside the home directory
  pub fn write_record(&self, group: &str, name: &str, record: DomainRecord) -> Domain {
    let group = self.group(group);
    let domain = Domain::from_record(name, &group.name, &group.path, record);
    domain.save().expect("save record");
    domain
  }

  pub fn add_repository(&self, group: &str, name: &str) -> Repository {
    let repository = Repository::new(name, self.temp.path().join("repos").join(name).to_string_lossy());
    self.group(group).add_repository(&repository).expect("add repository");
    repository
  }

  /// Simulate `restic mount`: the mountpoint gets a `tags/` directory
  pub fn mount(&self, group: &str) {
    let tags = self.group(group).mountpoint().join("tags");
    std::fs::create_dir_all(tags).expect("mount");
  }

  /// Simulate unmounting: the mountpoint is left empty
  pub fn unmount(&self, group: &str) {
    let mountpoint = self.group(group).mountpoint();
    let _ = std::fs::remove_dir_all(&mountpoint);
    std::fs::create_dir_all(&mountpoint).expect("recreate mountpoint");
  }

  pub fn reconciler(&self) -> Reconciler {
    Reconciler::new(self.registry.clone(), ReconcilerConfig::default())
  }
}

pub fn has_marker(path: &Path) -> bool {
  !probe::is_symlink(path) && path.join(".dfb-temporary").exists()
}

pub fn has_recovery_link(path: &Path) -> bool {
  probe::is_symlink(&path.join("__recover__"))
}

/// What a scripted backup does
#[derive(Debug, Clone)]
pub enum Script {
  /// Print lines with a pause after each, then exit
  Lines {
    lines: Vec<String>,
    pause: Duration,
    exit_code: i32,
  },
  /// Fail to run at all
  Fail,
}

impl Script {
  pub fn lines(lines: Vec<String>) -> Self {
    Self::Lines {
      lines,
      pause: Duration::ZERO,
      exit_code: 0,
    }
  }

  pub fn paced(lines: Vec<String>, pause: Duration) -> Self {
    Self::Lines {
      lines,
      pause,
      exit_code: 0,
    }
  }
}

pub fn status_line(fraction: f64) -> String {
  format!(r#"{{"message_type":"status","percent_done":{},"seconds_elapsed":1}}"#, fraction)
}

pub fn summary_line(data_added: u64) -> String {
  format!(
    r#"{{"message_type":"summary","files_new":1,"data_added":{},"total_duration":1.5,"snapshot_id":"s1"}}"#,
    data_added
  )
}

/// `BackupRunner` that plays back a script per domain and records every request.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
  scripts: HashMap<String, Script>,
  pub requests: Arc<Mutex<Vec<BackupRequest>>>,
}

impl ScriptedRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn script(mut self, domain: &str, script: Script) -> Self {
    self.scripts.insert(domain.to_string(), script);
    self
  }

  pub fn requests(&self) -> Vec<BackupRequest> {
    self.requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl BackupRunner for ScriptedRunner {
  async fn backup(
    &self,
    request: &BackupRequest,
    password: &Password,
    lines: &mpsc::UnboundedSender<String>,
  ) -> Result<i32, RunnerError> {
    assert_eq!(password.expose(), "secret");
    self.requests.lock().unwrap().push(request.clone());

    match self.scripts.get(&request.domain) {
      Some(Script::Lines {
        lines: script,
        pause,
        exit_code,
      }) => {
        for line in script {
          lines.send(line.clone()).unwrap();
          tokio::time::sleep(*pause).await;
        }
        Ok(*exit_code)
      }
      Some(Script::Fail) => Err(RunnerError::Io(std::io::Error::other("restic crashed"))),
      None => Ok(0),
    }
  }

  async fn verify_password(&self, _repository: &Repository, password: &Password) -> Result<bool, RunnerError> {
    Ok(password.expose() == "secret")
  }
}

use std::{
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::helpers::{Script, ScriptedRunner, TestContext, status_line, summary_line};
use crate::{
  actor::{
    message::BackupOutcome,
    pipeline::{BackupPlan, NoopStats, PipelineConfig, PipelineReport, StatsCollector, StatsError, run_pipeline},
  },
  domain::{Domain, DomainRecord, Repository, RepositoryScope},
  protocol::{Action, DomainTracker, Message, MessageRouter, RunState},
  restic::{Password, Session},
};

/// Counts the domains statistics were gathered for
#[derive(Default)]
struct CountingStats(AtomicUsize);

#[async_trait]
impl StatsCollector for CountingStats {
  async fn collect(&self, _group: &str, _domain: &Domain, _repository: &Repository) -> Result<(), StatsError> {
    self.0.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

/// Run a backup of `group` to `repository` and collect every emitted line
async fn run(
  ctx: &TestContext,
  group: &str,
  repository: &Repository,
  runner: ScriptedRunner,
  stats: Arc<dyn StatsCollector>,
  config: PipelineConfig,
) -> (PipelineReport, Vec<String>) {
  run_until(ctx, group, repository, runner, stats, config, CancellationToken::new()).await
}

async fn run_until(
  ctx: &TestContext,
  group: &str,
  repository: &Repository,
  runner: ScriptedRunner,
  stats: Arc<dyn StatsCollector>,
  config: PipelineConfig,
  cancel: CancellationToken,
) -> (PipelineReport, Vec<String>) {
  let plan = BackupPlan::resolve(&ctx.group(group), &repository.name).unwrap();
  let session = Arc::new(Session::unverified(repository.clone(), Password::new("secret")));
  let (tx, mut rx) = mpsc::unbounded_channel();

  let report = tokio::time::timeout(
    Duration::from_secs(10),
    run_pipeline(
      plan,
      session,
      Arc::new(runner),
      stats,
      tx,
      config,
      cancel,
    ),
  )
  .await
  .expect("pipeline finishes")
  .unwrap();

  let mut lines = Vec::new();
  while let Some(line) = rx.recv().await {
    lines.push(line);
  }
  (report, lines)
}

fn control_actions(lines: &[String]) -> Vec<(String, Action)> {
  lines
    .iter()
    .filter_map(|line| match Message::decode(line) {
      Some(Message::Control(control)) => Some((control.domain, control.action)),
      _ => None,
    })
    .collect()
}

#[tokio::test]
async fn test_end_to_end_single_domain() {
  let ctx = TestContext::new();
  ctx.add_domain("home", "notes");
  std::fs::create_dir_all(ctx.home_path("notes")).unwrap();
  let r1 = ctx.add_repository("home", "r1");

  let restic_lines = vec![status_line(0.1), status_line(0.6), summary_line(1024)];
  let runner = ScriptedRunner::new().script("notes", Script::lines(restic_lines.clone()));
  let config = PipelineConfig {
    backup_workers: 1,
    ..Default::default()
  };

  let (report, lines) = run(&ctx, "home", &r1, runner.clone(), Arc::new(NoopStats), config).await;

  // Exactly the three restic lines, in order, between begin and done
  let from_restic: Vec<String> = lines
    .iter()
    .filter(|line| !matches!(Message::decode(line), Some(Message::Control(_))))
    .cloned()
    .collect();
  assert_eq!(from_restic, restic_lines);

  let begin = lines
    .iter()
    .position(|line| line.contains(r#""action":"begin""#))
    .unwrap();
  assert!(lines[begin + 1..begin + 4] == restic_lines[..]);
  assert_eq!(control_actions(&lines).last().unwrap().1, Action::Done);

  assert_eq!(report.results.len(), 1);
  assert_eq!(report.results[0].domain, "notes");
  assert_eq!(report.results[0].outcome, BackupOutcome::Completed { exit_code: 0 });

  let requests = runner.requests();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].working_dir, ctx.home_path("notes"));
  assert_eq!(requests[0].target, ".");
  assert_eq!(requests[0].repository, r1);
  assert_eq!(requests[0].exclusions, vec!["**/node_modules", "**/.DS_Store", "**/venv"]);

  let tracker = DomainTracker::new();
  let mut router = MessageRouter::new().with(tracker.clone());
  for line in &lines {
    router.dispatch_line(line);
  }
  let runs = tracker.runs();
  assert_eq!(runs.len(), 1);
  assert_eq!(runs[0].summary.as_ref().unwrap().data_added, 1024);
  assert!(tracker.is_done());
}

#[tokio::test]
async fn test_interleaved_domains_stay_bracketed() {
  let ctx = TestContext::new();
  for name in ["alpha", "beta"] {
    ctx.add_domain("home", name);
    std::fs::create_dir_all(ctx.home_path(name)).unwrap();
  }
  let r1 = ctx.add_repository("home", "r1");

  let pause = Duration::from_millis(20);
  let runner = ScriptedRunner::new()
    .script(
      "alpha",
      Script::paced(vec![status_line(0.11), status_line(0.12), summary_line(1)], pause),
    )
    .script(
      "beta",
      Script::paced(vec![status_line(0.21), status_line(0.22), summary_line(2)], pause),
    );
  let config = PipelineConfig {
    backup_workers: 2,
    ..Default::default()
  };

  let (report, lines) = run(&ctx, "home", &r1, runner, Arc::new(NoopStats), config).await;
  assert_eq!(report.succeeded(), 2);

  let tracker = DomainTracker::new();
  let mut router = MessageRouter::new().with(tracker.clone());
  for line in &lines {
    router.dispatch_line(line);
  }
  router.finish();

  let runs = tracker.runs();
  assert_eq!(runs.len(), 2);

  for run in &runs {
    assert_eq!(run.terminal_events(), 1, "{}", run.domain);
    assert_eq!(run.state, RunState::Completed);

    let expected_tenth = if run.domain == "alpha" { 0.1 } else { 0.2 };
    for message in &run.messages {
      if let Message::Status(status) = message {
        assert!(
          (status.percent_done - expected_tenth).abs() < 0.05,
          "{} received a status of another domain",
          run.domain
        );
      }
    }

    let expected_data = if run.domain == "alpha" { 1 } else { 2 };
    assert_eq!(run.summary.as_ref().unwrap().data_added, expected_data);
  }
}

#[tokio::test]
async fn test_mixed_domains() {
  let ctx = TestContext::new();
  let r1 = ctx.add_repository("home", "r1");

  // Directory domain that backs up fine
  ctx.add_domain("home", "notes");
  std::fs::create_dir_all(ctx.home_path("notes")).unwrap();

  // Single file domain
  std::fs::write(ctx.home_path("todo.txt"), "buy milk").unwrap();
  ctx.add_domain("home", "todo.txt");

  // Symlinked domain whose source is gone
  ctx.add_symlinked_domain("home", "photos");
  std::fs::remove_dir(ctx.source_path("photos")).unwrap();

  // Domain restic cannot run for
  ctx.add_domain("home", "broken");
  std::fs::create_dir_all(ctx.home_path("broken")).unwrap();

  // Domain exiting non-zero
  ctx.add_domain("home", "flaky");
  std::fs::create_dir_all(ctx.home_path("flaky")).unwrap();

  // Domain that only backs up to another repository
  let mut record = DomainRecord::new(ctx.home_path("private"), None);
  record.repositories = RepositoryScope::parse("r2");
  ctx.write_record("home", "private", record);
  std::fs::create_dir_all(ctx.home_path("private")).unwrap();

  let runner = ScriptedRunner::new()
    .script("notes", Script::lines(vec![summary_line(10)]))
    .script("broken", Script::Fail)
    .script(
      "flaky",
      Script::Lines {
        lines: vec!["Fatal: unable to open repository".to_string()],
        pause: Duration::ZERO,
        exit_code: 1,
      },
    );
  let stats = Arc::new(CountingStats::default());

  let (report, lines) = run(
    &ctx,
    "home",
    &r1,
    runner.clone(),
    stats.clone(),
    PipelineConfig::default(),
  )
  .await;

  let outcome = |name: &str| {
    report
      .results
      .iter()
      .find(|r| r.domain == name)
      .map(|r| r.outcome.clone())
      .unwrap()
  };
  assert_eq!(outcome("notes"), BackupOutcome::Completed { exit_code: 0 });
  assert_eq!(outcome("todo.txt"), BackupOutcome::Completed { exit_code: 0 });
  assert_eq!(outcome("photos"), BackupOutcome::Unavailable);
  assert!(matches!(outcome("broken"), BackupOutcome::Failed { .. }));
  assert_eq!(outcome("flaky"), BackupOutcome::Completed { exit_code: 1 });
  assert_eq!(report.results.len(), 5);
  assert_eq!(report.skipped, vec!["private"]);
  assert_eq!((report.succeeded(), report.unavailable(), report.failed()), (2, 1, 2));

  // Single files are backed up by name from their parent directory
  let requests = runner.requests();
  let todo = requests.iter().find(|r| r.domain == "todo.txt").unwrap();
  assert_eq!(todo.working_dir, ctx.registry.home());
  assert_eq!(todo.target, "todo.txt");
  assert!(requests.iter().all(|r| r.domain != "photos" && r.domain != "private"));

  // Stats are gathered for every domain restic ran for
  assert_eq!(stats.0.load(Ordering::SeqCst), 3);

  let actions = control_actions(&lines);
  assert_eq!(actions[0], ("private".to_string(), Action::NotThisRepo));
  assert!(actions.contains(&("photos".to_string(), Action::Unavailable)));
  assert!(!actions.contains(&("photos".to_string(), Action::Begin)));
  assert!(actions.contains(&("notes".to_string(), Action::GatheringStatsDone)));
  assert!(!actions.contains(&("broken".to_string(), Action::GatheringStats)));
  assert_eq!(actions.last().unwrap().1, Action::Done);
}

#[tokio::test]
async fn test_cancel_finishes_running_domains_only() {
  let ctx = TestContext::new();
  for name in ["alpha", "beta", "gamma"] {
    ctx.add_domain("home", name);
    std::fs::create_dir_all(ctx.home_path(name)).unwrap();
  }
  let r1 = ctx.add_repository("home", "r1");

  let pause = Duration::from_millis(30);
  let script = || Script::paced(vec![status_line(0.1), status_line(0.5), summary_line(1)], pause);
  let runner = ScriptedRunner::new()
    .script("alpha", script())
    .script("beta", script())
    .script("gamma", script());
  let stats = Arc::new(CountingStats::default());
  let config = PipelineConfig {
    backup_workers: 2,
    ..Default::default()
  };

  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.cancel();
  });

  let (report, lines) = run_until(&ctx, "home", &r1, runner.clone(), stats.clone(), config, cancel).await;

  // Both running domains finish and are reported, the queued one never starts
  let reported: Vec<&str> = report.results.iter().map(|r| r.domain.as_str()).collect();
  assert_eq!(reported, vec!["alpha", "beta"]);
  assert_eq!(report.succeeded(), 2);
  assert!(runner.requests().iter().all(|r| r.domain != "gamma"));
  assert_eq!(stats.0.load(Ordering::SeqCst), 0);

  // Every restic line arrives before done
  let done = lines
    .iter()
    .position(|line| line.contains(r#""action":"done""#))
    .unwrap();
  assert_eq!(done, lines.len() - 1);
  assert_eq!(lines.iter().filter(|line| line.contains("summary")).count(), 2);

  let actions = control_actions(&lines);
  assert!(!actions.iter().any(|(domain, _)| domain == "gamma"));
}

#[tokio::test]
async fn test_empty_group_still_finishes() {
  let ctx = TestContext::new();
  let r1 = ctx.add_repository("home", "r1");

  let (report, lines) = run(
    &ctx,
    "home",
    &r1,
    ScriptedRunner::new(),
    Arc::new(NoopStats),
    PipelineConfig::default(),
  )
  .await;

  assert!(report.results.is_empty());
  assert_eq!(control_actions(&lines), vec![(String::new(), Action::Done)]);
}

#[tokio::test]
async fn test_session_rejects_wrong_password() {
  let repository = Repository::new("r1", "/srv/r1");
  let runner = ScriptedRunner::new();

  assert!(
    Session::open(&runner, repository.clone(), Password::new("secret"))
      .await
      .is_ok()
  );
  assert!(
    Session::open(&runner, repository, Password::new("guess"))
      .await
      .is_err()
  );
}

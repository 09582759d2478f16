use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use super::helpers::{TestContext, has_marker, has_recovery_link};
use crate::{
  domain::{DomainRecord, config::PlaceholderConfig},
  state::{DomainState, Representation, probe},
};

#[test]
fn test_mounted_group_gets_placeholder_and_recovery_link() {
  let ctx = TestContext::new();
  ctx.add_domain("home", "notes");
  ctx.mount("home");

  let report = ctx.reconciler().tick();
  assert_eq!(report.groups, 1);
  assert_eq!(report.mounted, 1);
  assert_eq!(report.failures, 0);

  let notes = ctx.home_path("notes");
  assert!(has_marker(&notes));
  assert!(has_recovery_link(&notes));
  assert_eq!(
    std::fs::read_link(notes.join("__recover__")).unwrap(),
    ctx.group("home").mountpoint().join("tags/notes")
  );
}

#[test]
fn test_tick_is_idempotent() {
  let ctx = TestContext::new();
  ctx.add_domain("home", "notes");
  ctx.mount("home");

  let reconciler = ctx.reconciler();
  assert_eq!(reconciler.tick().changes, 2);

  let second = reconciler.tick();
  assert_eq!(second.changes, 0);
  assert_eq!(second.failures, 0);
}

#[test]
fn test_unmount_releases_unused_placeholder() {
  let ctx = TestContext::new();
  ctx.add_domain("home", "notes");
  ctx.mount("home");

  let reconciler = ctx.reconciler();
  reconciler.tick();
  std::fs::write(ctx.home_path("notes").join(".DS_Store"), "").unwrap();

  ctx.unmount("home");
  reconciler.tick();

  assert!(!probe::entry_exists(&ctx.home_path("notes")));
}

#[test]
fn test_unmount_demotes_used_placeholder() {
  let ctx = TestContext::new();
  ctx.add_domain("home", "notes");
  ctx.mount("home");

  let reconciler = ctx.reconciler();
  reconciler.tick();

  let notes = ctx.home_path("notes");
  std::fs::write(notes.join("meeting.md"), "written while mounted").unwrap();

  ctx.unmount("home");
  reconciler.tick();

  assert!(notes.is_dir());
  assert!(!has_marker(&notes));
  assert!(!has_recovery_link(&notes));
  assert_eq!(
    std::fs::read_to_string(notes.join("meeting.md")).unwrap(),
    "written while mounted"
  );

  // Once demoted, the path is real content and survives later cycles
  ctx.mount("home");
  reconciler.tick();
  ctx.unmount("home");
  reconciler.tick();
  assert!(notes.join("meeting.md").is_file());
}

#[test]
fn test_real_content_is_never_deleted() {
  let ctx = TestContext::new();
  ctx.add_domain("home", "notes");
  let notes = ctx.home_path("notes");
  std::fs::create_dir_all(&notes).unwrap();

  ctx.mount("home");
  let reconciler = ctx.reconciler();
  reconciler.tick();
  assert!(!has_marker(&notes));
  assert!(has_recovery_link(&notes));

  ctx.unmount("home");
  reconciler.tick();

  // Empty, but never marked temporary
  assert!(notes.is_dir());
  assert!(!has_recovery_link(&notes));
}

#[test]
fn test_symlinked_domain_follows_its_source() {
  let ctx = TestContext::new();
  let domain = ctx.add_symlinked_domain("home", "photos");
  let photos = ctx.home_path("photos");
  let proxy = domain.symlink.clone().unwrap().proxy;

  let reconciler = ctx.reconciler();
  reconciler.tick();
  assert_eq!(std::fs::read_link(&photos).unwrap(), proxy);

  // Source goes away while the recovery view is mounted
  std::fs::remove_dir(ctx.source_path("photos")).unwrap();
  ctx.mount("home");
  reconciler.tick();
  assert!(!probe::is_symlink(&photos));
  assert!(has_marker(&photos));

  // Source comes back: the placeholder gives way to the link
  std::fs::create_dir_all(ctx.source_path("photos")).unwrap();
  reconciler.tick();
  assert_eq!(std::fs::read_link(&photos).unwrap(), proxy);
  assert!(!has_marker(&photos));
  assert_eq!(std::fs::read_link(&proxy).unwrap(), ctx.source_path("photos"));
}

#[test]
fn test_symlink_restored_within_two_ticks() {
  let ctx = TestContext::new();
  ctx.add_symlinked_domain("home", "photos");
  let photos = ctx.home_path("photos");
  let reconciler = ctx.reconciler();

  reconciler.tick();
  std::fs::remove_dir(ctx.source_path("photos")).unwrap();
  reconciler.tick();
  assert!(!probe::entry_exists(&photos));

  std::fs::create_dir_all(ctx.source_path("photos")).unwrap();
  reconciler.tick();
  reconciler.tick();

  assert!(probe::symlink_target_exists(&photos));
  assert!(!has_marker(&photos));
}

#[test]
fn test_recovery_links_kept_while_any_group_is_mounted() {
  let ctx = TestContext::new();
  ctx.add_domain("home", "notes");
  ctx.add_domain("work", "docs");
  let notes = ctx.home_path("notes");
  let docs = ctx.home_path("docs");

  ctx.mount("home");
  ctx.mount("work");
  let reconciler = ctx.reconciler();
  reconciler.tick();
  assert!(has_recovery_link(&notes));
  assert!(has_recovery_link(&docs));

  // work is unmounted, but home still is
  ctx.unmount("work");
  let report = reconciler.tick();
  assert_eq!(report.mounted, 1);
  assert!(has_recovery_link(&docs));
  assert!(has_marker(&docs));

  // Nothing mounted anywhere: everything is cleaned up
  ctx.unmount("home");
  let report = reconciler.tick();
  assert_eq!(report.mounted, 0);
  assert!(!probe::entry_exists(&notes));
  assert!(!probe::entry_exists(&docs));
}

#[test]
fn test_failed_domain_does_not_abort_tick() {
  let ctx = TestContext::new();
  let blocker = ctx.temp.path().join("blocker");
  std::fs::write(&blocker, "").unwrap();
  ctx.write_record("home", "broken", DomainRecord::new(blocker.join("broken"), None));
  ctx.add_domain("home", "notes");
  std::fs::write(ctx.group("home").domains_dir().join("garbage"), "no path here\n").unwrap();
  ctx.mount("home");

  let report = ctx.reconciler().tick();

  assert_eq!(report.failures, 2);
  assert_eq!(report.domains, 2);
  assert!(has_marker(&ctx.home_path("notes")));
}

#[test]
fn test_representations_stay_exclusive() {
  let ctx = TestContext::new();
  ctx.add_symlinked_domain("home", "photos");
  ctx.add_domain("home", "notes");
  let reconciler = ctx.reconciler();
  let rules = PlaceholderConfig::default();
  let source = ctx.source_path("photos");

  let steps: [(&str, bool, bool); 6] = [
    ("mounted, source present", true, true),
    ("mounted, source gone", true, false),
    ("unmounted, source gone", false, false),
    ("mounted, source gone again", true, false),
    ("unmounted, source back", false, true),
    ("mounted, source present", true, true),
  ];

  for (label, mounted, source_present) in steps {
    if mounted {
      ctx.mount("home");
    } else {
      ctx.unmount("home");
    }
    if source_present {
      std::fs::create_dir_all(&source).unwrap();
    } else {
      let _ = std::fs::remove_dir_all(&source);
    }

    reconciler.tick();

    let group = ctx.group("home");
    let photos = group.domain("photos").unwrap();
    let state = DomainState::new(&photos, &rules);
    let expected = match (mounted, source_present) {
      (_, true) => Representation::SymlinkedToProxy,
      (true, false) => Representation::TemporaryPlaceholder,
      (false, false) => Representation::Absent,
    };
    assert_eq!(state.resolve(), expected, "{}", label);

    let notes = group.domain("notes").unwrap();
    let state = DomainState::new(&notes, &rules);
    let expected = if mounted {
      Representation::TemporaryPlaceholder
    } else {
      Representation::Absent
    };
    assert_eq!(state.resolve(), expected, "{}", label);
  }
}

#[tokio::test]
async fn test_run_until_cancelled() {
  let ctx = TestContext::new();
  ctx.add_domain("home", "notes");
  ctx.mount("home");

  let cancel = CancellationToken::new();
  let task = tokio::spawn(ctx.reconciler().run(cancel.clone()));

  let notes = ctx.home_path("notes");
  let mut waited = Duration::ZERO;
  while !has_marker(&notes) && waited < Duration::from_secs(5) {
    tokio::time::sleep(Duration::from_millis(20)).await;
    waited += Duration::from_millis(20);
  }
  assert!(has_marker(&notes), "first tick runs immediately");

  cancel.cancel();
  tokio::time::timeout(Duration::from_secs(5), task)
    .await
    .expect("reconciler stops")
    .unwrap();
}

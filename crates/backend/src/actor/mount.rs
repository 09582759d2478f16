//! Recovery view mount detection.
//!
//! A group's recovery view is mounted when its mountpoint directory lists at
//! least one entry. A missing mountpoint is not mounted, not an error.

use crate::domain::Group;

pub fn is_mounted(group: &Group) -> bool {
  match std::fs::read_dir(group.mountpoint()) {
    Ok(mut entries) => entries.next().is_some(),
    Err(_) => false,
  }
}

/// Number of groups with a mounted recovery view
pub fn count_mounted(groups: &[Group]) -> usize {
  groups.iter().filter(|group| is_mounted(group)).count()
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;
  use crate::domain::Registry;

  #[test]
  fn test_mount_detection() {
    let temp = TempDir::new().unwrap();
    let registry = Registry::new(temp.path().join("root"), temp.path().join("home"));
    let home = registry.create_group("home").unwrap();
    let work = registry.create_group("work").unwrap();

    // Missing mountpoint
    assert!(!is_mounted(&home));

    // Empty mountpoint
    std::fs::create_dir_all(home.mountpoint()).unwrap();
    assert!(!is_mounted(&home));

    std::fs::create_dir_all(home.mountpoint().join("tags")).unwrap();
    assert!(is_mounted(&home));
    assert!(!is_mounted(&work));

    assert_eq!(count_mounted(&[home, work]), 1);
  }
}

//! Config commands (show, init)

use std::path::Path;

use anyhow::{Context, Result};
use dfb::{config::Config, dirs};

/// Print the effective configuration
pub async fn cmd_config_show() -> Result<()> {
  let root = dirs::default_root_dir();
  let path = Config::path(&root);
  let config = Config::load(&root);

  if path.exists() {
    println!("Using config: {}", path.display());
  } else {
    println!("Using default configuration (no config file at {})", path.display());
  }
  println!();
  println!("{}", toml::to_string_pretty(&config)?);

  Ok(())
}

/// Write the default config file
pub async fn cmd_config_init() -> Result<()> {
  let root = dirs::default_root_dir();
  match write_template(&root)? {
    true => println!("Created config: {}", Config::path(&root).display()),
    false => println!("Config already exists: {}", Config::path(&root).display()),
  }
  Ok(())
}

/// Returns false if a config file is already there
fn write_template(root: &Path) -> Result<bool> {
  let path = Config::path(root);
  if path.exists() {
    return Ok(false);
  }

  std::fs::create_dir_all(root).with_context(|| format!("Failed to create {}", root.display()))?;
  std::fs::write(&path, Config::generate_template()).with_context(|| format!("Failed to write {}", path.display()))?;
  Ok(true)
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn test_write_template_keeps_existing_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("dfb");

    assert!(write_template(&root).unwrap());
    assert_eq!(Config::load(&root), Config::default());

    std::fs::write(Config::path(&root), "[backup]\nbackup_workers = 5\n").unwrap();
    assert!(!write_template(&root).unwrap());
    assert_eq!(Config::load(&root).backup.backup_workers, 5);
  }
}

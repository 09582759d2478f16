//! Group commands (ls, add, repos, add-repo)

use std::io::{self, Write};

use anyhow::{Context, Result};
use dfb::{RuntimeConfig, domain::Registry, domain::Repository};

use super::write_table;

pub async fn cmd_groups_ls() -> Result<()> {
  list_groups(&RuntimeConfig::load().registry(), &mut io::stdout())
}

pub async fn cmd_groups_add(name: &str) -> Result<()> {
  let group = RuntimeConfig::load()
    .registry()
    .create_group(name)
    .context("Failed to create group")?;
  println!("Group created at {}", group.path.display());
  Ok(())
}

pub async fn cmd_groups_repos(group: &str) -> Result<()> {
  list_repositories(&RuntimeConfig::load().registry(), group, &mut io::stdout())
}

pub async fn cmd_groups_add_repo(group: &str, name: &str, locator: &str) -> Result<()> {
  let group = RuntimeConfig::load()
    .registry()
    .group(group)
    .context("Failed to add repository")?;
  group
    .add_repository(&Repository::new(name, locator))
    .context("Failed to add repository")?;
  println!("Repository {} added to {}", name, group.name);
  Ok(())
}

fn list_groups(registry: &Registry, out: &mut impl Write) -> Result<()> {
  let groups = registry.groups().context("Failed to read groups")?;
  let rows: Vec<Vec<String>> = groups
    .iter()
    .enumerate()
    .map(|(i, group)| vec![(i + 1).to_string(), group.name.clone()])
    .collect();
  write_table(out, &["#", "Group"], &rows)?;
  Ok(())
}

fn list_repositories(registry: &Registry, group: &str, out: &mut impl Write) -> Result<()> {
  let repositories = registry
    .group(group)
    .and_then(|group| group.repositories())
    .context("Failed to list repositories")?;
  let rows: Vec<Vec<String>> = repositories
    .iter()
    .enumerate()
    .map(|(i, repo)| vec![(i + 1).to_string(), repo.name.clone(), repo.locator.clone()])
    .collect();
  write_table(out, &["#", "Name", "Repository"], &rows)?;
  Ok(())
}

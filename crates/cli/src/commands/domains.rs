//! Domain commands (ls, add, rm, not-added)

use std::{
  io::{self, Write},
  path::PathBuf,
};

use anyhow::{Context, Result};
use dfb::{RuntimeConfig, domain::Registry};
use tracing::warn;

use super::write_table;

/// Extra columns of `domains ls`
#[derive(Debug, Clone, Copy, Default)]
pub struct ListColumns {
  pub repositories: bool,
  pub symlink: bool,
}

pub async fn cmd_domains_ls(columns: ListColumns) -> Result<()> {
  list_domains(&RuntimeConfig::load().registry(), columns, &mut io::stdout())
}

pub async fn cmd_domains_add(group: &str, name: &str, symlink: Option<PathBuf>) -> Result<()> {
  let symlink = symlink
    .map(std::path::absolute)
    .transpose()
    .context("Invalid symlink source")?;

  let domain = RuntimeConfig::load()
    .registry()
    .group(group)
    .and_then(|group| group.add_domain(name, symlink))
    .context("Failed to add domain")?;

  println!("Domain {} created at {}", domain.name, domain.content_path.display());
  if let Some(proxy) = &domain.symlink {
    println!("Content lives at {}", proxy.source.display());
  }
  Ok(())
}

pub async fn cmd_domains_rm(group: &str, name: &str) -> Result<()> {
  let domain = RuntimeConfig::load()
    .registry()
    .group(group)
    .and_then(|group| group.remove_domain(name))
    .context("Failed to remove domain")?;

  println!("Removed domain {}", domain.name);
  println!(
    "The content at {} was left in place. It is no longer backed up, and earlier snapshots still hold it.",
    domain.content_path.display()
  );
  Ok(())
}

pub async fn cmd_domains_not_added(group: &str) -> Result<()> {
  let entries = RuntimeConfig::load()
    .registry()
    .group(group)
    .and_then(|group| group.unregistered_entries())
    .context("Failed to list home directory")?;

  let rows: Vec<Vec<String>> = entries
    .into_iter()
    .enumerate()
    .map(|(i, name)| vec![(i + 1).to_string(), name])
    .collect();
  write_table(&mut io::stdout(), &["#", "Name"], &rows)?;
  Ok(())
}

fn list_domains(registry: &Registry, columns: ListColumns, out: &mut impl Write) -> Result<()> {
  let mut header = vec!["#", "Group", "Domain"];
  if columns.repositories {
    header.push("Repositories");
  }
  if columns.symlink {
    header.push("Symlink");
  }

  let mut rows = Vec::new();
  for group in registry.groups().context("Failed to read groups")? {
    for name in group.domain_names()? {
      let domain = match group.domain(&name) {
        Ok(domain) => domain,
        Err(e) => {
          warn!(group = %group.name, domain = %name, error = %e, "Skipping domain");
          continue;
        }
      };

      let mut row = vec![(rows.len() + 1).to_string(), group.name.clone(), domain.name.clone()];
      if columns.repositories {
        row.push(domain.repositories.to_string());
      }
      if columns.symlink {
        row.push(
          domain
            .symlink
            .as_ref()
            .map(|proxy| proxy.source.display().to_string())
            .unwrap_or_default(),
        );
      }
      rows.push(row);
    }
  }

  write_table(out, &header, &rows)?;
  Ok(())
}

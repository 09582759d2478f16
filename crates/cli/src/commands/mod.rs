//! CLI command implementations

mod backup;
mod config;
mod daemon;
mod domains;
mod groups;
mod progress;

use std::io::{self, Write};

pub use backup::cmd_backup;
pub use config::{cmd_config_init, cmd_config_show};
pub use daemon::cmd_daemon;
pub use domains::{ListColumns, cmd_domains_add, cmd_domains_ls, cmd_domains_not_added, cmd_domains_rm};
pub use groups::{cmd_groups_add, cmd_groups_add_repo, cmd_groups_ls, cmd_groups_repos};
pub use progress::cmd_progress;

/// Write rows as left-aligned columns under a header
pub(crate) fn write_table(out: &mut impl Write, header: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
  let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
  for row in rows {
    for (i, cell) in row.iter().enumerate() {
      if i < widths.len() {
        widths[i] = widths[i].max(cell.chars().count());
      }
    }
  }

  let render = |cells: Vec<&str>| -> String {
    cells
      .iter()
      .zip(&widths)
      .map(|(cell, width)| format!("{:<width$}", cell, width = width))
      .collect::<Vec<_>>()
      .join("  ")
      .trim_end()
      .to_string()
  };

  writeln!(out, "{}", render(header.to_vec()))?;
  let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
  writeln!(out, "{}", render(rule.iter().map(String::as_str).collect()))?;
  for row in rows {
    writeln!(out, "{}", render(row.iter().map(String::as_str).collect()))?;
  }
  Ok(())
}

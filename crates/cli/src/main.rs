//! dfb CLI - domain based filesystem backups with restic

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod format;
mod logging;

use commands::{
  ListColumns, cmd_backup, cmd_config_init, cmd_config_show, cmd_daemon, cmd_domains_add, cmd_domains_ls,
  cmd_domains_not_added, cmd_domains_rm, cmd_groups_add, cmd_groups_add_repo, cmd_groups_ls, cmd_groups_repos,
  cmd_progress,
};
use dfb::RuntimeConfig;
use logging::{init_cli_logging, init_daemon_logging};

#[derive(Parser)]
#[command(name = "dfb")]
#[command(about = "Domain based filesystem backups with restic")]
#[command(after_help = "\
QUICK START:
  dfb groups add home                       # Create a group
  dfb groups add-repo home nas sftp:nas:/r  # Add a restic repository
  dfb domains add home Documents            # Back up ~/Documents
  dfb backup home nas                       # Run a backup
  dfb daemon                                # Keep domain paths in shape")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

/// Subcommands for `dfb groups`
#[derive(Subcommand)]
pub enum GroupsCommand {
  /// List groups
  Ls,
  /// Add a new group
  Add { group: String },
  /// List the restic repositories of a group
  Repos { group: String },
  /// Add a restic repository to a group
  AddRepo {
    group: String,
    /// Name used on the command line
    name: String,
    /// Restic repository, eg. /mnt/backup or sftp:host:/path
    locator: String,
  },
}

/// Subcommands for `dfb domains`
#[derive(Subcommand)]
pub enum DomainsCommand {
  /// List configured domains
  Ls {
    /// Include repositories in output
    #[arg(short = 'r', long)]
    include_repositories: bool,
    /// Include symlink source in output
    #[arg(short = 's', long)]
    include_symlink: bool,
  },
  /// Add a new domain
  Add {
    group: String,
    domain: String,
    /// Domain content lives at this path and is symlinked into the home directory
    #[arg(short, long)]
    symlink: Option<PathBuf>,
  },
  /// Remove a domain. Its content is left in place.
  Rm { group: String, domain: String },
  /// List entries in the home directory not added as domains
  NotAdded { group: String },
}

/// Subcommands for `dfb config`
#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show effective configuration
  Show,
  /// Write the default config file
  Init,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the reconciliation daemon
  Daemon {
    /// Log to the console instead of the log file
    #[arg(long)]
    foreground: bool,
  },
  /// Back up every domain of a group to a repository
  Backup { group: String, repository: String },
  /// Group management
  Groups {
    #[command(subcommand)]
    command: GroupsCommand,
  },
  /// Domain management
  Domains {
    #[command(subcommand)]
    command: DomainsCommand,
  },
  /// Render a backup message stream read from stdin
  Progress {
    /// Label progress lines with this instead of the domain name
    prefix: Option<String>,
  },
  /// Configuration management
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // File logging for the daemon, console for everything else
  let (_guard, runtime) = match &cli.command {
    Commands::Daemon { foreground } => {
      let mut runtime = RuntimeConfig::load();
      runtime.foreground = *foreground;
      let guard = init_daemon_logging(runtime.foreground, &runtime.config.daemon, &runtime.data_dir);
      (guard, Some(runtime))
    }
    _ => {
      init_cli_logging();
      (None, None)
    }
  };

  match cli.command {
    Commands::Daemon { .. } => cmd_daemon(runtime.unwrap_or_else(RuntimeConfig::load)).await,
    Commands::Backup { group, repository } => cmd_backup(&group, &repository).await,

    Commands::Groups { command } => match command {
      GroupsCommand::Ls => cmd_groups_ls().await,
      GroupsCommand::Add { group } => cmd_groups_add(&group).await,
      GroupsCommand::Repos { group } => cmd_groups_repos(&group).await,
      GroupsCommand::AddRepo { group, name, locator } => cmd_groups_add_repo(&group, &name, &locator).await,
    },

    Commands::Domains { command } => match command {
      DomainsCommand::Ls {
        include_repositories,
        include_symlink,
      } => {
        cmd_domains_ls(ListColumns {
          repositories: include_repositories,
          symlink: include_symlink,
        })
        .await
      }
      DomainsCommand::Add { group, domain, symlink } => cmd_domains_add(&group, &domain, symlink).await,
      DomainsCommand::Rm { group, domain } => cmd_domains_rm(&group, &domain).await,
      DomainsCommand::NotAdded { group } => cmd_domains_not_added(&group).await,
    },

    Commands::Progress { prefix } => cmd_progress(prefix).await,

    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show().await,
      ConfigCommand::Init => cmd_config_init().await,
    },
  }
}

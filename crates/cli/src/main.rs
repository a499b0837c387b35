//! `cfgcache` - inspect and prune configuration cache entries.

mod cmd;
mod output;
mod prompts;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{DeleteArgs, cmd_delete, cmd_list, cmd_show};
use crate::output::{OutputFormat, Status};

/// Inspect the configuration cache
#[derive(Parser)]
#[command(name = "cfgcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// List cache entries, most recent first
  List {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show the segments and included builds of an entry
  Show {
    /// Entry key
    key: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Delete cache entries
  Delete {
    /// Entry keys to delete
    #[arg(required_unless_present_any = ["all", "older_than"], conflicts_with = "all")]
    keys: Vec<String>,

    /// Delete every entry
    #[arg(long)]
    all: bool,

    /// Delete entries not written for this long (e.g., "7d", "24h")
    #[arg(long, value_parser = humantime::parse_duration)]
    older_than: Option<Duration>,

    /// Preview what would be deleted without deleting
    #[arg(long)]
    dry_run: bool,

    /// Skip confirmation prompt
    #[arg(long)]
    force: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let result = run(cli);
  if let Err(e) = result {
    Status::Failed.emit(&format!("{:#}", e));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::List { output } => cmd_list(cli.verbose, output),
    Commands::Show { key, output } => cmd_show(&key, cli.verbose, output),
    Commands::Delete {
      keys,
      all,
      older_than,
      dry_run,
      force,
      output,
    } => cmd_delete(DeleteArgs {
      keys,
      all,
      older_than,
      dry_run,
      force,
      output,
    }),
  }
}

/// `RUST_LOG` wins; otherwise `-v` raises the default level to debug.
fn init_logging(verbose: bool) {
  let default_level = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

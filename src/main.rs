mod app;
mod cache;
mod commands;
mod config;
mod error;
mod identity;
mod logging;
mod output;
mod todos;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use todos::types::OwnerId;

#[derive(Parser, Debug)]
#[command(name = "todo-sync")]
#[command(about = "A terminal client for a remote todo API with a persisted local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/todo-sync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Act as this owner for this invocation only
  #[arg(short, long)]
  owner: Option<String>,

  /// Keep the cache in memory only
  #[arg(long)]
  no_persist: bool,

  /// Mirror log output to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging, args.verbose);

  let app = app::App::new(&config, args.owner.map(OwnerId::from), !args.no_persist)?;
  app.run(args.command).await?;

  Ok(())
}

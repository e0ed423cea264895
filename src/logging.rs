//! Tracing setup.
//!
//! Logs go to a daily-rotated file so they never interleave with command
//! output. `--verbose` additionally mirrors them to stderr.

use std::path::PathBuf;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "todo-sync.log";

/// Keeps the background log writer alive; drop it last.
pub struct LogGuard {
  _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn default_log_dir() -> Option<PathBuf> {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|p| p.join("todo-sync").join("logs"))
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
  EnvFilter::try_from_env("TODO_SYNC_LOG")
    .or_else(|_| EnvFilter::try_new(&config.level))
    .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(config: &LoggingConfig, verbose: bool) -> LogGuard {
  let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
  let mut guard = None;

  let dir = config.dir.clone().or_else(default_log_dir);
  match dir.map(|d| std::fs::create_dir_all(&d).map(|_| d)) {
    Some(Ok(dir)) => {
      let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
      let (writer, worker) = tracing_appender::non_blocking(appender);
      layers.push(Box::new(
        tracing_subscriber::fmt::layer()
          .with_writer(writer)
          .with_ansi(false)
          .with_target(true),
      ));
      guard = Some(worker);
    }
    // Without a log directory, stderr is the only place left
    _ if !verbose => layers.push(stderr_layer()),
    _ => {}
  }

  if verbose {
    layers.push(stderr_layer());
  }

  let _ = tracing_subscriber::registry()
    .with(layers)
    .with(build_filter(config))
    .try_init();

  LogGuard { _guard: guard }
}

fn stderr_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
  Box::new(
    tracing_subscriber::fmt::layer()
      .compact()
      .with_writer(std::io::stderr)
      .with_target(false),
  )
}

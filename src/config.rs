use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::todos::types::OwnerId;
use crate::todos::TODOS_ENDPOINT;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  /// Owner to act as when nobody has signed in with `login`
  pub owner_id: Option<OwnerId>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_base_url() -> String {
  "https://jsonplaceholder.typicode.com/".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// SQLite file for the persisted cache (defaults to the user data dir)
  pub path: Option<PathBuf>,
  /// Seconds before a cached list is refetched
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
  /// Endpoints whose cached results survive restarts
  #[serde(default = "default_persist")]
  pub persist: BTreeSet<String>,
  /// Set to false to keep the cache in memory only
  #[serde(default = "default_true")]
  pub enabled: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      path: None,
      stale_secs: default_stale_secs(),
      persist: default_persist(),
      enabled: true,
    }
  }
}

impl CacheConfig {
  /// `stale_secs` as a duration, saturating for values chrono can't hold.
  pub fn stale_time(&self) -> Duration {
    i64::try_from(self.stale_secs)
      .ok()
      .and_then(Duration::try_seconds)
      .unwrap_or(Duration::MAX)
  }
}

fn default_stale_secs() -> u64 {
  300
}

fn default_persist() -> BTreeSet<String> {
  BTreeSet::from([TODOS_ENDPOINT.to_string()])
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Filter directive used when TODO_SYNC_LOG is unset
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Directory for log files (defaults to the user data dir)
  pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      dir: None,
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./todo-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/todo-sync/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("todo-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("todo-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the owner id from environment variables.
  ///
  /// Checks TODO_SYNC_OWNER.
  pub fn owner_from_env() -> Option<OwnerId> {
    std::env::var("TODO_SYNC_OWNER")
      .ok()
      .filter(|s| !s.trim().is_empty())
      .map(OwnerId::from)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_full_config() {
    let config = Config::parse(
      r#"
api:
  base_url: http://localhost:3000/
  timeout_secs: 5
owner_id: 7
cache:
  path: /tmp/todo-sync.db
  stale_secs: 60
  persist: [getTodos, getPublicTodos]
logging:
  level: debug
"#,
    )
    .unwrap();

    assert_eq!(config.api.base_url, "http://localhost:3000/");
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.owner_id, Some(OwnerId::from("7")));
    assert_eq!(config.cache.stale_secs, 60);
    assert!(config.cache.persist.contains("getPublicTodos"));
    assert!(config.cache.enabled);
    assert_eq!(config.logging.level, "debug");
  }

  #[test]
  fn test_defaults() {
    let config = Config::parse("").unwrap();

    assert_eq!(config.api.base_url, "https://jsonplaceholder.typicode.com/");
    assert_eq!(config.cache.stale_secs, 300);
    assert_eq!(
      config.cache.persist,
      BTreeSet::from(["getTodos".to_string()])
    );
    assert_eq!(config.owner_id, None);
  }

  #[test]
  fn test_partial_sections_fill_defaults() {
    let config = Config::parse("cache:\n  enabled: false\n").unwrap();

    assert!(!config.cache.enabled);
    assert_eq!(config.cache.stale_secs, 300);
    assert_eq!(config.api.timeout_secs, 30);
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let result = Config::load(Some(Path::new("/nonexistent/todo-sync.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_stale_time() {
    let config = Config::parse("cache:\n  stale_secs: 60\n").unwrap();
    assert_eq!(config.cache.stale_time(), Duration::seconds(60));
  }

  #[test]
  fn test_huge_stale_secs_saturates() {
    let config = Config::parse("cache:\n  stale_secs: 10000000000000000\n").unwrap();
    assert_eq!(config.cache.stale_time(), Duration::MAX);

    let config = Config::parse(&format!("cache:\n  stale_secs: {}\n", u64::MAX)).unwrap();
    assert_eq!(config.cache.stale_time(), Duration::MAX);
  }
}

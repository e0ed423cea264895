use thiserror::Error;

/// Errors raised by the sync core.
///
/// Resource errors reach callers unchanged; nothing in the core retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
  #[error("Not signed in")]
  Unauthenticated,

  #[error("Network error: {message}")]
  Network {
    message: String,
    /// HTTP status, when the server answered at all
    status: Option<u16>,
  },

  #[error("Failed to decode server response: {0}")]
  Decode(String),

  #[error("No cached entry for {key}")]
  KeyNotFound { key: String },

  #[error("Todo {id} not found")]
  NotFound { id: u64 },

  #[error("Invalid todo: {0}")]
  Validation(String),

  #[error("Storage error: {0}")]
  Storage(String),
}

impl SyncError {
  pub fn network(message: impl Into<String>) -> Self {
    SyncError::Network {
      message: message.into(),
      status: None,
    }
  }
}

impl From<reqwest::Error> for SyncError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      return SyncError::Decode(e.to_string());
    }
    SyncError::Network {
      message: e.to_string(),
      status: e.status().map(|s| s.as_u16()),
    }
  }
}

impl From<serde_json::Error> for SyncError {
  fn from(e: serde_json::Error) -> Self {
    SyncError::Decode(e.to_string())
  }
}

impl From<rusqlite::Error> for SyncError {
  fn from(e: rusqlite::Error) -> Self {
    SyncError::Storage(e.to_string())
  }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

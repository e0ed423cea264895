//! Todo domain types and their wire encoding.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{SyncError, SyncResult};

/// Longest title accepted for create and edit.
pub const MAX_TITLE_LEN: usize = 100;

/// Opaque identifier of the signed-in owner.
///
/// The remote API encodes owners as numbers; numeric ids go out as JSON
/// numbers and anything else as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for OwnerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for OwnerId {
  fn from(s: &str) -> Self {
    Self(s.trim().to_string())
  }
}

impl From<String> for OwnerId {
  fn from(s: String) -> Self {
    Self::from(s.as_str())
  }
}

impl Serialize for OwnerId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    // Only canonical decimals become numbers; "007" and "+7" stay strings
    match self.0.parse::<u64>() {
      Ok(n) if n.to_string() == self.0 => serializer.serialize_u64(n),
      _ => serializer.serialize_str(&self.0),
    }
  }
}

impl<'de> Deserialize<'de> for OwnerId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Number(u64),
      Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Number(n) => OwnerId(n.to_string()),
      Raw::Text(s) => OwnerId::from(s),
    })
  }
}

/// A single todo as returned by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
  #[serde(rename = "userId")]
  pub owner_id: OwnerId,
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub completed: bool,
}

/// Body of a create request. The server assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTodo {
  #[serde(rename = "userId")]
  pub owner_id: OwnerId,
  pub title: String,
  pub completed: bool,
}

impl NewTodo {
  pub fn new(owner_id: OwnerId, title: impl Into<String>) -> Self {
    Self {
      owner_id,
      title: title.into(),
      completed: false,
    }
  }
}

/// Partial update addressed by id. Only the fields present are replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodoPatch {
  pub id: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed: Option<bool>,
}

impl TodoPatch {
  pub fn new(id: u64) -> Self {
    Self {
      id,
      ..Default::default()
    }
  }

  pub fn title(mut self, title: impl Into<String>) -> Self {
    self.title = Some(title.into());
    self
  }

  pub fn completed(mut self, completed: bool) -> Self {
    self.completed = Some(completed);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.completed.is_none()
  }

  /// Merge the present fields into `todo`.
  pub fn apply(&self, todo: &mut Todo) {
    if let Some(title) = &self.title {
      todo.title = title.clone();
    }
    if let Some(completed) = self.completed {
      todo.completed = completed;
    }
  }
}

/// Check a title against the bounds accepted by create and edit.
pub fn validate_title(title: &str) -> SyncResult<()> {
  if title.trim().is_empty() {
    return Err(SyncError::Validation("title is required".to_string()));
  }
  if title.chars().count() > MAX_TITLE_LEN {
    return Err(SyncError::Validation(format!(
      "title is longer than {} characters",
      MAX_TITLE_LEN
    )));
  }
  Ok(())
}

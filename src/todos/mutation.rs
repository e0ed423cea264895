//! Write path: confirm-then-commit mutations.
//!
//! A write is sent to the remote resource first. The owner's cached list is
//! patched only once the server has confirmed it; a failed request leaves the
//! cache exactly as it was. Concurrent writes are not serialized, so patches
//! land in the order their requests settle.

use std::sync::Arc;
use tracing::{info, warn};

use super::cache::{position_of, todos_key};
use super::resource::TodoResource;
use super::types::{validate_title, NewTodo, OwnerId, Todo, TodoPatch};
use crate::cache::{CacheStore, QueryKey};
use crate::error::{SyncError, SyncResult};
use crate::identity::Session;

/// Effect of a confirmed write on the cached list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
  /// The cached todo was updated or removed
  Applied,
  /// No cached todo had the id; the list was left as is
  Missing,
}

pub struct MutationCoordinator<R: TodoResource> {
  resource: Arc<R>,
  store: CacheStore<Todo>,
  session: Session,
}

impl<R: TodoResource> MutationCoordinator<R> {
  pub fn new(resource: Arc<R>, store: CacheStore<Todo>, session: Session) -> Self {
    Self {
      resource,
      store,
      session,
    }
  }

  fn owner(&self) -> SyncResult<OwnerId> {
    self
      .session
      .current_owner_id()
      .ok_or(SyncError::Unauthenticated)
  }

  /// Patch the owner's list after the server has accepted a write.
  fn commit<T>(&self, key: &QueryKey, f: impl FnOnce(&mut Vec<Todo>) -> T) -> SyncResult<T> {
    self.store.patch(key, f).inspect_err(|e| {
      warn!(%key, error = %e, "write accepted by server but list is not cached; refetch to reconcile");
    })
  }

  /// Create a todo for the signed-in owner and append the server's copy.
  pub async fn create(&self, title: &str) -> SyncResult<Todo> {
    let owner = self.owner()?;
    validate_title(title)?;

    let new_todo = NewTodo::new(owner.clone(), title.trim());
    let created = self
      .resource
      .create(&new_todo)
      .await
      .inspect_err(|e| warn!(error = %e, "failed to add todo"))?;

    let key = todos_key(&owner);
    let todo = created.clone();
    self.commit(&key, move |todos| todos.push(todo))?;

    info!(id = created.id, %owner, "todo created");
    Ok(created)
  }

  /// Send `patch` and merge its fields into the cached todo with the same id.
  pub async fn update(&self, patch: TodoPatch) -> SyncResult<PatchOutcome> {
    let owner = self.owner()?;
    if patch.is_empty() {
      return Err(SyncError::Validation("nothing to update".to_string()));
    }
    if let Some(title) = &patch.title {
      validate_title(title)?;
    }

    self
      .resource
      .update(&owner, &patch)
      .await
      .inspect_err(|e| warn!(id = patch.id, error = %e, "failed to update todo"))?;

    let key = todos_key(&owner);
    let outcome = self.commit(&key, |todos| match position_of(todos, patch.id) {
      Some(index) => {
        patch.apply(&mut todos[index]);
        PatchOutcome::Applied
      }
      None => PatchOutcome::Missing,
    })?;

    if outcome == PatchOutcome::Missing {
      warn!(id = patch.id, %key, "updated todo is not in the cached list");
    } else {
      info!(id = patch.id, %owner, "todo updated");
    }
    Ok(outcome)
  }

  /// Flip the completed flag of a cached todo.
  pub async fn toggle(&self, id: u64) -> SyncResult<PatchOutcome> {
    let owner = self.owner()?;
    let key = todos_key(&owner);

    let todos = self.store.get(&key).ok_or_else(|| SyncError::KeyNotFound {
      key: key.to_string(),
    })?;
    let current = position_of(&todos, id)
      .map(|index| &todos[index])
      .ok_or(SyncError::NotFound { id })?;

    self
      .update(TodoPatch::new(id).completed(!current.completed))
      .await
  }

  /// Delete a todo and drop it from the owner's cached list.
  pub async fn delete(&self, id: u64) -> SyncResult<PatchOutcome> {
    let owner = self.owner()?;

    self
      .resource
      .delete(id)
      .await
      .inspect_err(|e| warn!(id, error = %e, "failed to delete todo"))?;

    let key = todos_key(&owner);
    let outcome = self.commit(&key, |todos| match position_of(todos, id) {
      Some(index) => {
        todos.remove(index);
        PatchOutcome::Applied
      }
      None => PatchOutcome::Missing,
    })?;

    if outcome == PatchOutcome::Missing {
      warn!(id, %key, "deleted todo is not in the cached list");
    } else {
      info!(id, %owner, "todo deleted");
    }
    Ok(outcome)
  }
}

impl<R: TodoResource> Clone for MutationCoordinator<R> {
  fn clone(&self) -> Self {
    Self {
      resource: Arc::clone(&self.resource),
      store: self.store.clone(),
      session: self.session.clone(),
    }
  }
}

//! The remote todo resource contract.

use std::future::Future;

use super::types::{NewTodo, OwnerId, Todo, TodoPatch};
use crate::error::SyncResult;

/// Remote todo collection.
///
/// Every call is a single round trip: no retries and no caching.
pub trait TodoResource: Send + Sync {
  /// Todos belonging to `owner`, in server order.
  fn list(&self, owner: &OwnerId) -> impl Future<Output = SyncResult<Vec<Todo>>> + Send;

  /// Every todo, regardless of owner.
  fn list_all(&self) -> impl Future<Output = SyncResult<Vec<Todo>>> + Send;

  /// Create a todo and return the server's copy.
  fn create(&self, todo: &NewTodo) -> impl Future<Output = SyncResult<Todo>> + Send;

  /// Replace the fields present in `patch` and return the server's copy.
  fn update(
    &self,
    owner: &OwnerId,
    patch: &TodoPatch,
  ) -> impl Future<Output = SyncResult<Todo>> + Send;

  fn delete(&self, id: u64) -> impl Future<Output = SyncResult<()>> + Send;
}

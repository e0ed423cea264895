//! Todo client that pairs the remote resource with the shared cache.

use chrono::Duration;
use std::sync::Arc;

use crate::cache::{CacheLayer, CacheResult, CacheStore};
use crate::error::{SyncError, SyncResult};
use crate::identity::{IdentityChange, Session};

use super::cache::{public_todos_key, todos_key};
use super::mutation::{MutationCoordinator, PatchOutcome};
use super::resource::TodoResource;
use super::types::{OwnerId, Todo, TodoPatch};

/// Todo client with transparent caching support.
///
/// Reads go through the cache layer; writes go through the mutation
/// coordinator, which patches the same store once the server confirms.
pub struct CachedTodoClient<R: TodoResource> {
  resource: Arc<R>,
  cache: CacheLayer<Todo>,
  mutations: MutationCoordinator<R>,
  session: Session,
}

impl<R: TodoResource> CachedTodoClient<R> {
  pub fn new(resource: R, store: CacheStore<Todo>, session: Session, stale_time: Duration) -> Self {
    let resource = Arc::new(resource);
    let cache = CacheLayer::new(store.clone()).with_stale_time(stale_time);
    let mutations = MutationCoordinator::new(Arc::clone(&resource), store.clone(), session.clone());

    // Cached data belongs to the identity that fetched it
    session.on_identity_change(move |change| {
      if change.invalidates_cache() {
        store.reset();
      }
    });

    Self {
      resource,
      cache,
      mutations,
      session,
    }
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn store(&self) -> &CacheStore<Todo> {
    self.cache.store()
  }

  fn owner(&self) -> SyncResult<OwnerId> {
    self
      .session
      .current_owner_id()
      .ok_or(SyncError::Unauthenticated)
  }

  /// The signed-in owner's todos, from cache when fresh.
  pub async fn todos(&self) -> SyncResult<CacheResult<Vec<Todo>>> {
    let owner = self.owner()?;
    let resource = Arc::clone(&self.resource);

    self
      .cache
      .fetch_list(&todos_key(&owner), || async move { resource.list(&owner).await })
      .await
  }

  /// Re-fetch the signed-in owner's todos regardless of freshness.
  pub async fn refresh(&self) -> SyncResult<CacheResult<Vec<Todo>>> {
    let owner = self.owner()?;
    let resource = Arc::clone(&self.resource);

    self
      .cache
      .refetch(&todos_key(&owner), || async move { resource.list(&owner).await })
      .await
  }

  /// Every todo, readable without signing in.
  pub async fn public_todos(&self) -> SyncResult<CacheResult<Vec<Todo>>> {
    let resource = Arc::clone(&self.resource);

    self
      .cache
      .fetch_list(&public_todos_key(), || async move { resource.list_all().await })
      .await
  }

  pub async fn create(&self, title: &str) -> SyncResult<Todo> {
    self.mutations.create(title).await
  }

  pub async fn update(&self, patch: TodoPatch) -> SyncResult<PatchOutcome> {
    self.mutations.update(patch).await
  }

  pub async fn toggle(&self, id: u64) -> SyncResult<PatchOutcome> {
    self.mutations.toggle(id).await
  }

  pub async fn delete(&self, id: u64) -> SyncResult<PatchOutcome> {
    self.mutations.delete(id).await
  }

  /// Switch identity, dropping cached data that belonged to someone else.
  pub fn sign_in(&self, owner: OwnerId) -> IdentityChange {
    self.session.sign_in(owner)
  }

  pub fn sign_out(&self) -> IdentityChange {
    self.session.sign_out()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::todos::resource::fake::FakeResource;

  fn todo(owner: &str, id: u64) -> Todo {
    Todo {
      owner_id: OwnerId::from(owner),
      id,
      title: format!("todo {}", id),
      completed: false,
    }
  }

  fn client(owner: Option<&str>) -> CachedTodoClient<FakeResource> {
    let resource = FakeResource::with_todos(vec![todo("7", 1), todo("7", 2), todo("8", 3)]);
    CachedTodoClient::new(
      resource,
      CacheStore::new(),
      Session::new(owner.map(OwnerId::from)),
      Duration::minutes(5),
    )
  }

  #[tokio::test]
  async fn test_todos_scoped_to_owner_and_cached() {
    let client = client(Some("7"));

    let first = client.todos().await.unwrap();
    let second = client.todos().await.unwrap();

    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(first.data, vec![todo("7", 1), todo("7", 2)]);
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(client.resource.calls(), 1);
  }

  #[tokio::test]
  async fn test_refresh_always_fetches() {
    let client = client(Some("7"));

    client.todos().await.unwrap();
    let refreshed = client.refresh().await.unwrap();

    assert_eq!(refreshed.source, CacheSource::Network);
    assert_eq!(client.resource.calls(), 2);
  }

  #[tokio::test]
  async fn test_todos_require_sign_in() {
    let client = client(None);

    assert!(matches!(client.todos().await, Err(SyncError::Unauthenticated)));
    assert_eq!(client.resource.calls(), 0);
  }

  #[tokio::test]
  async fn test_public_todos_need_no_identity() {
    let client = client(None);

    let result = client.public_todos().await.unwrap();

    assert_eq!(result.data.len(), 3);
    assert!(client.store().get(&public_todos_key()).is_some());
  }

  #[tokio::test]
  async fn test_create_after_list_shows_in_reads() {
    let client = client(Some("7"));
    client.todos().await.unwrap();

    let created = client.create("Buy milk").await.unwrap();
    let listed = client.todos().await.unwrap();

    assert_eq!(listed.source, CacheSource::CacheFresh);
    assert_eq!(listed.data.last(), Some(&created));
  }

  #[tokio::test]
  async fn test_sign_out_resets_cache() {
    let client = client(Some("7"));
    client.todos().await.unwrap();

    assert_eq!(client.sign_out(), IdentityChange::SignedOut);

    assert!(client.store().snapshot().is_empty());
  }

  #[tokio::test]
  async fn test_switching_owner_resets_cache() {
    let client = client(Some("7"));
    client.todos().await.unwrap();

    assert_eq!(client.sign_in(OwnerId::from("7")), IdentityChange::Unchanged);
    assert!(client.store().get(&todos_key(&OwnerId::from("7"))).is_some());

    assert_eq!(client.sign_in(OwnerId::from("8")), IdentityChange::Switched);
    assert!(client.store().snapshot().is_empty());

    let todos = client.todos().await.unwrap();
    assert_eq!(todos.data, vec![todo("8", 3)]);
  }

  #[tokio::test]
  async fn test_identity_change_through_session_resets_cache() {
    let client = client(Some("7"));
    client.todos().await.unwrap();
    client.public_todos().await.unwrap();

    let session = client.session().clone();
    assert_eq!(session.sign_in(OwnerId::from("8")), IdentityChange::Switched);

    assert!(client.store().snapshot().is_empty());
    let todos = client.todos().await.unwrap();
    assert_eq!(todos.source, CacheSource::Network);
    assert_eq!(todos.data, vec![todo("8", 3)]);
  }
}

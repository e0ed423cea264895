//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use tracing::{debug, warn};

use super::store::CacheStore;
use super::traits::{CacheResult, Cacheable, QueryKey};
use crate::error::SyncResult;

/// Read path over a [`CacheStore`].
///
/// Serves fresh entries straight from the store and fetches from the network
/// when an entry is missing or stale.
pub struct CacheLayer<T: Cacheable> {
  store: CacheStore<T>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<T: Cacheable> CacheLayer<T> {
  /// Create a new cache layer over the given store.
  pub fn new(store: CacheStore<T>) -> Self {
    Self {
      store,
      stale_time: Duration::minutes(5),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn store(&self) -> &CacheStore<T> {
    &self.store
  }

  /// Check if cached data is stale based on cached_at timestamp.
  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }

  /// Fetch a list with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network
  /// 3. On network failure, return stale cache (offline mode)
  /// 4. Update cache with new data
  pub async fn fetch_list<F, Fut>(&self, key: &QueryKey, fetcher: F) -> SyncResult<CacheResult<Vec<T>>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = SyncResult<Vec<T>>>,
  {
    let Some(cached) = self.store.entry(key) else {
      // No cache, must fetch from network
      debug!(%key, "cache miss");
      return self.refetch(key, fetcher).await;
    };

    if !self.is_stale(cached.fetched_at) {
      return Ok(CacheResult::from_cache(cached.items, cached.fetched_at));
    }

    // Cache is stale, try to fetch from network
    match fetcher().await {
      Ok(data) => {
        self.store.set(key, data.clone());
        Ok(CacheResult::from_network(data))
      }
      Err(e) => {
        warn!(%key, error = %e, "refresh failed, serving stale cache");
        Ok(CacheResult::offline(cached.items, cached.fetched_at))
      }
    }
  }

  /// Always fetch from the network and replace the cached entry.
  pub async fn refetch<F, Fut>(&self, key: &QueryKey, fetcher: F) -> SyncResult<CacheResult<Vec<T>>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = SyncResult<Vec<T>>>,
  {
    let data = fetcher().await?;
    self.store.set(key, data.clone());
    Ok(CacheResult::from_network(data))
  }
}

impl<T: Cacheable> Clone for CacheLayer<T> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      stale_time: self.stale_time,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::store::CacheEntry;
  use crate::cache::CacheSource;
  use crate::error::SyncError;
  use crate::todos::types::{OwnerId, Todo};
  use crate::todos::cache::todos_key;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn todo(id: u64) -> Todo {
    Todo {
      owner_id: OwnerId::from("7"),
      id,
      title: format!("todo {}", id),
      completed: false,
    }
  }

  fn key() -> QueryKey {
    todos_key(&OwnerId::from("7"))
  }

  fn stale_store(items: Vec<Todo>) -> CacheStore<Todo> {
    let store = CacheStore::new();
    store.restore(
      key(),
      CacheEntry {
        items,
        fetched_at: Utc::now() - Duration::hours(1),
      },
    );
    store
  }

  #[tokio::test]
  async fn test_fresh_entry_skips_network() {
    let store = CacheStore::new();
    store.set(&key(), vec![todo(1)]);
    let layer = CacheLayer::new(store);
    let calls = AtomicUsize::new(0);

    let result = layer
      .fetch_list(&key(), || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![todo(2)])
      })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::CacheFresh);
    assert_eq!(result.data, vec![todo(1)]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_miss_fetches_and_populates() {
    let layer = CacheLayer::new(CacheStore::new());

    let result = layer
      .fetch_list(&key(), || async { Ok(vec![todo(1)]) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(layer.store().get(&key()), Some(vec![todo(1)]));
  }

  #[tokio::test]
  async fn test_miss_with_failure_stays_absent() {
    let layer: CacheLayer<Todo> = CacheLayer::new(CacheStore::new());

    let result = layer
      .fetch_list(&key(), || async { Err(SyncError::network("down")) })
      .await;

    assert!(matches!(result, Err(SyncError::Network { .. })));
    assert_eq!(layer.store().get(&key()), None);
  }

  #[tokio::test]
  async fn test_stale_entry_is_refreshed() {
    let layer = CacheLayer::new(stale_store(vec![todo(1)]));

    let result = layer
      .fetch_list(&key(), || async { Ok(vec![todo(1), todo(2)]) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(layer.store().get(&key()), Some(vec![todo(1), todo(2)]));
  }

  #[tokio::test]
  async fn test_stale_entry_served_offline() {
    let layer = CacheLayer::new(stale_store(vec![todo(1)]));

    let result = layer
      .fetch_list(&key(), || async { Err(SyncError::network("down")) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, vec![todo(1)]);
    assert!(result.cached_at.is_some());
  }

  #[tokio::test]
  async fn test_refetch_ignores_freshness() {
    let store = CacheStore::new();
    store.set(&key(), vec![todo(1)]);
    let layer = CacheLayer::new(store).with_stale_time(Duration::hours(1));

    let result = layer
      .refetch(&key(), || async { Ok(vec![todo(3)]) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(layer.store().get(&key()), Some(vec![todo(3)]));
  }
}

//! In-memory normalized cache of query results.
//!
//! The store is a cloneable handle; every clone sees the same entries and the
//! same observers. Observers are notified after each `set`, `patch` and
//! `reset`, with the internal lock already released.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::traits::{Cacheable, QueryKey};
use crate::error::{SyncError, SyncResult};

/// One cached query result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
  /// Entities in server order
  pub items: Vec<T>,
  /// When the list was last fetched from the network
  pub fetched_at: DateTime<Utc>,
}

/// Change notification emitted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// An entry was replaced wholesale
  Set(QueryKey),
  /// An entry was mutated in place
  Patched(QueryKey),
  /// Every entry was dropped
  Reset,
}

/// Subscriber to store changes.
pub trait CacheObserver<T: Cacheable>: Send + Sync {
  fn on_change(&self, event: &CacheEvent, store: &CacheStore<T>);
}

impl<T, F> CacheObserver<T> for F
where
  T: Cacheable,
  F: Fn(&CacheEvent, &CacheStore<T>) + Send + Sync,
{
  fn on_change(&self, event: &CacheEvent, store: &CacheStore<T>) {
    self(event, store)
  }
}

/// Handle returned by [`CacheStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type ObserverList<T> = Vec<(SubscriptionId, Arc<dyn CacheObserver<T>>)>;

/// Keyed collection of query results.
pub struct CacheStore<T: Cacheable> {
  entries: Arc<Mutex<BTreeMap<QueryKey, CacheEntry<T>>>>,
  observers: Arc<Mutex<ObserverList<T>>>,
  next_subscription: Arc<AtomicU64>,
}

impl<T: Cacheable> CacheStore<T> {
  pub fn new() -> Self {
    Self {
      entries: Arc::new(Mutex::new(BTreeMap::new())),
      observers: Arc::new(Mutex::new(Vec::new())),
      next_subscription: Arc::new(AtomicU64::new(1)),
    }
  }

  fn lock_entries(&self) -> MutexGuard<'_, BTreeMap<QueryKey, CacheEntry<T>>> {
    // A panicking patch closure leaves the map itself intact
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn lock_observers(&self) -> MutexGuard<'_, ObserverList<T>> {
    self.observers.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Current items for `key`, if the query has been cached.
  pub fn get(&self, key: &QueryKey) -> Option<Vec<T>> {
    self.lock_entries().get(key).map(|e| e.items.clone())
  }

  /// Current entry for `key`, including its fetch time.
  pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry<T>> {
    self.lock_entries().get(key).cloned()
  }

  /// Replace the entry at `key` with a freshly fetched list.
  pub fn set(&self, key: &QueryKey, items: Vec<T>) {
    {
      let mut entries = self.lock_entries();
      entries.insert(
        key.clone(),
        CacheEntry {
          items,
          fetched_at: Utc::now(),
        },
      );
    }
    debug!(%key, "cache entry set");
    self.notify(&CacheEvent::Set(key.clone()));
  }

  /// Mutate the list at `key` in place.
  ///
  /// Fails with [`SyncError::KeyNotFound`] when nothing is cached at `key`;
  /// the closure is not called in that case.
  pub fn patch<R>(&self, key: &QueryKey, f: impl FnOnce(&mut Vec<T>) -> R) -> SyncResult<R> {
    let result = {
      let mut entries = self.lock_entries();
      let entry = entries.get_mut(key).ok_or_else(|| SyncError::KeyNotFound {
        key: key.to_string(),
      })?;
      f(&mut entry.items)
    };
    debug!(%key, "cache entry patched");
    self.notify(&CacheEvent::Patched(key.clone()));
    Ok(result)
  }

  /// Insert a rehydrated entry without notifying observers.
  pub fn restore(&self, key: QueryKey, entry: CacheEntry<T>) {
    self.lock_entries().insert(key, entry);
  }

  /// Drop every entry (sign-out).
  pub fn reset(&self) {
    self.lock_entries().clear();
    debug!("cache reset");
    self.notify(&CacheEvent::Reset);
  }

  /// Copy of every entry, in key order.
  pub fn snapshot(&self) -> Vec<(QueryKey, CacheEntry<T>)> {
    self
      .lock_entries()
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect()
  }

  pub fn subscribe(&self, observer: Arc<dyn CacheObserver<T>>) -> SubscriptionId {
    let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
    self.lock_observers().push((id, observer));
    id
  }

  /// Remove an observer. Returns false if it was not subscribed.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let mut observers = self.lock_observers();
    let before = observers.len();
    observers.retain(|(sub, _)| *sub != id);
    observers.len() != before
  }

  fn notify(&self, event: &CacheEvent) {
    let observers: Vec<Arc<dyn CacheObserver<T>>> = self
      .lock_observers()
      .iter()
      .map(|(_, o)| Arc::clone(o))
      .collect();

    for observer in observers {
      observer.on_change(event, self);
    }
  }
}

impl<T: Cacheable> Default for CacheStore<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Cacheable> Clone for CacheStore<T> {
  fn clone(&self) -> Self {
    Self {
      entries: Arc::clone(&self.entries),
      observers: Arc::clone(&self.observers),
      next_subscription: Arc::clone(&self.next_subscription),
    }
  }
}

//! Write-through persistence of a whitelisted slice of the cache.
//!
//! The slice is stored as a single JSON document under [`PERSIST_KEY`]. The
//! entries are kept as an embedded JSON string together with its SHA-256, so
//! a truncated or hand-edited file is detected before anything is restored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use super::storage::KeyValueStorage;
use super::store::{CacheEntry, CacheEvent, CacheObserver, CacheStore, SubscriptionId};
use super::traits::{Cacheable, QueryKey};
use crate::error::{SyncError, SyncResult};

/// Storage key holding the persisted slice.
pub const PERSIST_KEY: &str = "persist:root";

const SLICE_VERSION: u32 = 1;

/// Endpoints whose entries may be written to durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist {
  endpoints: BTreeSet<String>,
}

impl Whitelist {
  pub fn new<I, S>(endpoints: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      endpoints: endpoints.into_iter().map(Into::into).collect(),
    }
  }

  pub fn allows(&self, key: &QueryKey) -> bool {
    self.endpoints.contains(&key.endpoint)
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSlice {
  version: u32,
  entity_type: String,
  /// Hex SHA-256 of `entries`
  checksum: String,
  /// JSON-encoded `Vec<PersistedEntry<T>>`
  entries: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry<T> {
  key: QueryKey,
  fetched_at: DateTime<Utc>,
  items: Vec<T>,
}

fn checksum(payload: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(payload.as_bytes());
  hex::encode(hasher.finalize())
}

/// Keeps durable storage in step with the cache store.
pub struct PersistenceAdapter<S: KeyValueStorage + ?Sized> {
  storage: Arc<S>,
  whitelist: Whitelist,
  /// Held from snapshot to storage write so slices land in commit order
  write_lock: Arc<Mutex<()>>,
}

impl<S: KeyValueStorage + ?Sized + 'static> PersistenceAdapter<S> {
  pub fn new(storage: Arc<S>, whitelist: Whitelist) -> Self {
    Self {
      storage,
      whitelist,
      write_lock: Arc::new(Mutex::new(())),
    }
  }

  /// Rehydrate `store`, then subscribe so every later change is written through.
  pub fn attach<T: Cacheable>(&self, store: &CacheStore<T>) -> SubscriptionId {
    let restored = self.rehydrate(store);
    info!(restored, "cache rehydrated");
    store.subscribe(Arc::new(self.clone()))
  }

  /// Serialize the whitelisted entries of `store` into durable storage.
  pub fn write_through<T: Cacheable>(&self, store: &CacheStore<T>) -> SyncResult<()> {
    let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
    let entries: Vec<PersistedEntry<T>> = store
      .snapshot()
      .into_iter()
      .filter(|(key, _)| self.whitelist.allows(key))
      .map(|(key, entry)| PersistedEntry {
        key,
        fetched_at: entry.fetched_at,
        items: entry.items,
      })
      .collect();

    let payload = serde_json::to_string(&entries)?;
    let slice = PersistedSlice {
      version: SLICE_VERSION,
      entity_type: T::entity_type().to_string(),
      checksum: checksum(&payload),
      entries: payload,
    };

    self.storage.set(PERSIST_KEY, &serde_json::to_string(&slice)?)?;
    debug!(entries = entries.len(), "persisted cache slice");
    Ok(())
  }

  /// Restore the persisted slice into `store`.
  ///
  /// Returns the number of entries restored. Any problem with the stored
  /// slice leaves the store untouched and is only logged.
  pub fn rehydrate<T: Cacheable>(&self, store: &CacheStore<T>) -> usize {
    let raw = match self.storage.get(PERSIST_KEY) {
      Ok(Some(raw)) => raw,
      Ok(None) => return 0,
      Err(e) => {
        warn!(error = %e, "could not read persisted cache, starting empty");
        return 0;
      }
    };

    let entries = match decode_slice::<T>(&raw) {
      Ok(entries) => entries,
      Err(e) => {
        warn!(error = %e, "discarding persisted cache, starting empty");
        return 0;
      }
    };

    let mut restored = 0;
    for entry in entries {
      if !self.whitelist.allows(&entry.key) {
        debug!(key = %entry.key, "dropping non-whitelisted persisted entry");
        continue;
      }
      store.restore(
        entry.key,
        CacheEntry {
          items: entry.items,
          fetched_at: entry.fetched_at,
        },
      );
      restored += 1;
    }
    restored
  }

  /// Delete the persisted slice.
  pub fn purge(&self) -> SyncResult<()> {
    self.storage.remove(PERSIST_KEY)
  }
}

fn decode_slice<T: Cacheable>(raw: &str) -> SyncResult<Vec<PersistedEntry<T>>> {
  let slice: PersistedSlice = serde_json::from_str(raw)?;

  if slice.version != SLICE_VERSION {
    return Err(SyncError::Decode(format!(
      "unsupported slice version {}",
      slice.version
    )));
  }
  if slice.entity_type != T::entity_type() {
    return Err(SyncError::Decode(format!(
      "slice holds {}, expected {}",
      slice.entity_type,
      T::entity_type()
    )));
  }
  if checksum(&slice.entries) != slice.checksum {
    return Err(SyncError::Decode("checksum mismatch".to_string()));
  }

  Ok(serde_json::from_str(&slice.entries)?)
}

impl<S: KeyValueStorage + ?Sized> Clone for PersistenceAdapter<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      whitelist: self.whitelist.clone(),
      write_lock: Arc::clone(&self.write_lock),
    }
  }
}

impl<T, S> CacheObserver<T> for PersistenceAdapter<S>
where
  T: Cacheable,
  S: KeyValueStorage + ?Sized + 'static,
{
  fn on_change(&self, event: &CacheEvent, store: &CacheStore<T>) {
    if let Err(e) = self.write_through(store) {
      error!(?event, error = %e, "failed to persist cache");
    }
  }
}

//! Generic caching layer for query results and their persistence.
//!
//! This module provides an entity-agnostic caching mechanism that:
//! - Keeps query results in a shared in-memory store keyed by endpoint + argument
//! - Notifies observers after every change
//! - Writes a whitelisted slice of the store through to durable storage
//! - Serves stale data when the network is unavailable

mod layer;
mod persist;
mod storage;
mod store;
mod traits;

pub use layer::CacheLayer;
pub use persist::{PersistenceAdapter, Whitelist};
pub use storage::{KeyValueStorage, NoopStorage, SqliteStorage};
pub use store::{CacheStore, SubscriptionId};
pub use traits::{CacheResult, CacheSource, Cacheable, QueryKey};

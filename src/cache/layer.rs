//! Cache layer that orchestrates the TTL store and in-flight deduplication.

use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::flight::{FlightResult, FlightTracker};
use super::key::QueryKey;
use super::store::{CacheStore, CachedValue, DEFAULT_TTL};
use crate::error::FetchError;

/// Point-in-time counters for maintenance surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
  pub size: usize,
  pub pending_requests: usize,
}

/// One shared cache for the whole data layer.
///
/// Sits between resource handles and the transport: cache-first resolution,
/// forced bypass for refreshes, and deduplicated execution on miss. The store
/// is written exactly once per execution, inside the winning fetch, before
/// any joined caller observes the result.
///
/// Constructed explicitly and passed by reference (`Arc`): the application
/// creates one instance at startup and hands it to every consumer, which also
/// gives tests a fresh cache each.
pub struct CacheLayer {
  store: Arc<CacheStore>,
  flights: FlightTracker,
  default_ttl: Duration,
}

impl CacheLayer {
  pub fn new() -> Self {
    Self {
      store: Arc::new(CacheStore::new()),
      flights: FlightTracker::new(),
      default_ttl: DEFAULT_TTL,
    }
  }

  /// Override the TTL used when a fetch does not specify one.
  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  /// Synchronous cache-first lookup for a typed payload.
  pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    self.store.get_as::<T>(&key.cache_hash())
  }

  /// When the live entry for `key` was written.
  pub fn stored_at(&self, key: &QueryKey) -> Option<chrono::DateTime<chrono::Utc>> {
    self.store.stored_at(&key.cache_hash())
  }

  /// Write a payload directly, bypassing any fetch. Used by optimistic
  /// updates; the entry gets the same lifetime a fetched value would.
  pub fn put<T: Send + Sync + 'static>(&self, key: &QueryKey, value: Arc<T>, ttl: Option<Duration>) {
    let ttl = ttl.unwrap_or(self.default_ttl);
    self.store.set(&key.cache_hash(), value as CachedValue, ttl);
  }

  /// Resolve `key` through the cache: live entry unless `force`, otherwise a
  /// deduplicated execution of `make_fut` whose success is stored with `ttl`.
  ///
  /// A forced refresh still routes through the same deduplication key, so a
  /// refresh overlapping an automatic fetch collapses into one execution.
  pub async fn fetch_erased<F>(
    &self,
    key: &QueryKey,
    ttl: Option<Duration>,
    force: bool,
    make_fut: F,
  ) -> FlightResult
  where
    F: FnOnce() -> BoxFuture<'static, FlightResult>,
  {
    let hash = key.cache_hash();

    if !force {
      if let Some(hit) = self.store.get(&hash) {
        tracing::debug!(key = %key.description(), "cache hit");
        return Ok(hit);
      }
    }

    let ttl = ttl.unwrap_or(self.default_ttl);
    let store = Arc::clone(&self.store);
    let store_key = hash.clone();

    self
      .flights
      .run(&hash, move || {
        let fut = make_fut();
        async move {
          match fut.await {
            Ok(value) => {
              store.set(&store_key, Arc::clone(&value), ttl);
              Ok(value)
            }
            Err(err) => Err(err),
          }
        }
        .boxed()
      })
      .await
  }

  /// Typed wrapper over [`fetch_erased`](Self::fetch_erased).
  pub async fn fetch_through<T, F, Fut>(
    &self,
    key: &QueryKey,
    ttl: Option<Duration>,
    force: bool,
    fetcher: F,
  ) -> Result<Arc<T>, FetchError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    let value = self
      .fetch_erased(key, ttl, force, move || {
        let fut = fetcher();
        async move { fut.await.map(|v| Arc::new(v) as CachedValue) }.boxed()
      })
      .await?;

    value.downcast::<T>().map_err(|_| {
      FetchError::api(
        format!("cached payload for `{}` has an unexpected type", key.tag()),
        None,
        false,
      )
    })
  }

  /// Remove the entry for one key without refetching.
  pub fn invalidate(&self, key: &QueryKey) -> bool {
    self.store.invalidate(&key.cache_hash())
  }

  /// Remove every entry whose store key matches `pattern`. Keys are
  /// tag-prefixed, so `^device_analytics:` clears one resource family.
  pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
    self.store.invalidate_matching(pattern)
  }

  /// Drop all entries and all pending registrations.
  pub fn clear_all(&self) {
    self.store.clear();
    self.flights.clear();
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      size: self.store.len(),
      pending_requests: self.flights.len(),
    }
  }
}

impl Default for CacheLayer {
  fn default() -> Self {
    Self::new()
  }
}

//! Single-resource fetch handle with cache, loading and error state.
//!
//! `Resource<T>` binds one fetch closure and one cache key to the state a
//! consumer renders from: `data`, `loading`, `error`, `last_fetch_at`. The
//! cache layer is shared across handles; the state is owned by the handle
//! that created it.
//!
//! # Example
//!
//! ```ignore
//! let mut analytics = Resource::new(
//!   DeviceQuery::analytics("dev-42").key(),
//!   Arc::clone(&cache),
//!   move || {
//!     let transport = Arc::clone(&transport);
//!     async move { transport.device_analytics("dev-42").await }
//!   },
//! );
//!
//! // Mount: cache-first, spawns a deduplicated fetch on miss
//! analytics.fetch();
//!
//! // In the consumer's tick
//! if analytics.poll() {
//!   // state changed, re-render
//! }
//!
//! // User-driven retry
//! let packets = analytics.refresh().await?;
//! ```

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cache::{CacheLayer, QueryKey};
use crate::error::FetchError;

type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;
type SuccessCallback<T> = Box<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&FetchError) + Send + Sync>;

/// One subscriber's view of one fetchable resource.
pub struct Resource<T> {
  key: QueryKey,
  cache: Arc<CacheLayer>,
  fetcher: FetcherFn<T>,
  ttl: Option<Duration>,
  enabled: bool,
  on_success: Option<SuccessCallback<T>>,
  on_error: Option<ErrorCallback>,

  data: Option<Arc<T>>,
  loading: bool,
  error: Option<FetchError>,
  last_fetch_at: Option<DateTime<Utc>>,
  receiver: Option<mpsc::UnboundedReceiver<Result<Arc<T>, FetchError>>>,
}

impl<T: Send + Sync + 'static> Resource<T> {
  /// Create a handle for `key`, resolving through `cache` with `fetcher`.
  ///
  /// The fetcher is a closure returning a future; it is invoked once per
  /// actual network execution — joining an in-flight fetch for the same key
  /// does not invoke it.
  pub fn new<F, Fut>(key: QueryKey, cache: Arc<CacheLayer>, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    Self {
      key,
      cache,
      fetcher: Arc::new(move || fetcher().boxed()),
      ttl: None,
      enabled: true,
      on_success: None,
      on_error: None,
      data: None,
      loading: false,
      error: None,
      last_fetch_at: None,
      receiver: None,
    }
  }

  /// Entry lifetime for values this handle fetches. Defaults to the cache
  /// layer's default (5 minutes).
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = Some(ttl);
    self
  }

  /// When disabled, `fetch()` is a no-op and state stays at its initial
  /// empty values. A manual `refresh()` still works — it is an explicit
  /// user action, not the automatic mount path.
  pub fn with_enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  /// Called with the resolved value after every successful settlement.
  /// Receives the value only, never a cache handle.
  pub fn on_success<F: Fn(&T) + Send + Sync + 'static>(mut self, callback: F) -> Self {
    self.on_success = Some(Box::new(callback));
    self
  }

  /// Called with the error after every failed settlement.
  pub fn on_error<F: Fn(&FetchError) + Send + Sync + 'static>(mut self, callback: F) -> Self {
    self.on_error = Some(Box::new(callback));
    self
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_deref()
  }

  pub fn loading(&self) -> bool {
    self.loading
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref()
  }

  /// Timestamp of the last successful settlement observed by this handle.
  pub fn last_fetch_at(&self) -> Option<DateTime<Utc>> {
    self.last_fetch_at
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// The mount path: resolve from cache when a live entry exists, otherwise
  /// spawn a deduplicated fetch and flip `loading` on.
  ///
  /// A cache hit populates `data` and clears `error` with no network
  /// activity. A no-op while disabled or while a fetch is already pending.
  pub fn fetch(&mut self) {
    if !self.enabled {
      return;
    }

    if let Some(hit) = self.cache.peek::<T>(&self.key) {
      tracing::debug!(key = %self.key.description(), "resource resolved from cache");
      self.data = Some(hit);
      self.error = None;
      return;
    }

    if self.receiver.is_some() {
      return;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.loading = true;

    let cache = Arc::clone(&self.cache);
    let key = self.key.clone();
    let ttl = self.ttl;
    let fetcher = Arc::clone(&self.fetcher);
    tokio::spawn(async move {
      let result = cache.fetch_through(&key, ttl, false, move || (*fetcher)()).await;
      // The handle may be gone by now; a failed send is the liveness guard
      // working, not an error.
      let _ = tx.send(result);
    });
  }

  /// Apply a settled result from a spawned fetch.
  ///
  /// Returns `true` when state changed. Call from the consumer's tick.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = &mut self.receiver else {
      return false;
    };

    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        self.apply_settled(result);
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.receiver = None;
        self.apply_settled(Err(FetchError::network("fetch task dropped before settling")));
        true
      }
    }
  }

  /// Force a re-fetch, bypassing the cache read exactly once.
  ///
  /// Still routes through the deduplication key, so a refresh overlapping an
  /// in-flight fetch for the same key collapses into that execution. Updates
  /// state identically to the automatic path and re-raises the error to the
  /// caller.
  pub async fn refresh(&mut self) -> Result<Arc<T>, FetchError> {
    // Drop any pending delivery so the settled result is applied once.
    self.receiver = None;
    self.loading = true;

    let fetcher = Arc::clone(&self.fetcher);
    let result = self
      .cache
      .fetch_through(&self.key, self.ttl, true, move || (*fetcher)())
      .await;
    self.apply_settled(result)
  }

  /// Remove this resource's cache entry without refetching. The handle's
  /// in-memory `data` is left untouched.
  pub fn invalidate(&self) {
    self.cache.invalidate(&self.key);
  }

  /// Apply `update` to the current value synchronously, writing both the
  /// visible state and the cache entry (same TTL), without waiting for
  /// server confirmation.
  ///
  /// Reconciliation is keep-overlay: a later failed fetch leaves the
  /// optimistic value in place (the failure path never touches `data`); the
  /// next successful fetch overwrites it.
  pub fn optimistic_update<F>(&mut self, update: F)
  where
    F: FnOnce(Option<&T>) -> T,
  {
    let next = Arc::new(update(self.data.as_deref()));
    self.cache.put(&self.key, Arc::clone(&next), self.ttl);
    self.data = Some(next);
  }

  fn apply_settled(&mut self, result: Result<Arc<T>, FetchError>) -> Result<Arc<T>, FetchError> {
    self.loading = false;
    match &result {
      Ok(value) => {
        self.data = Some(Arc::clone(value));
        self.error = None;
        self.last_fetch_at = Some(Utc::now());
        if let Some(callback) = &self.on_success {
          callback(value);
        }
      }
      Err(err) => {
        // Previous data is left in place: stale-but-displayed.
        self.error = Some(err.clone());
        if let Some(callback) = &self.on_error {
          callback(err);
        }
      }
    }
    result
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Resource<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Resource")
      .field("key", &self.key)
      .field("data", &self.data)
      .field("loading", &self.loading)
      .field("error", &self.error)
      .field("last_fetch_at", &self.last_fetch_at)
      .finish_non_exhaustive()
  }
}

//! Multi-resource fan-out through the shared cache.
//!
//! A `ResourceSet` runs a named set of fetch descriptors as one unit with
//! settle-all semantics: one descriptor's failure never cancels, blocks, or
//! poisons the others.

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheLayer, CachedValue, QueryKey};
use crate::error::FetchError;

type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<CachedValue, FetchError>> + Send + Sync>;

/// One named member of a [`ResourceSet`].
pub struct FetchDescriptor {
  name: String,
  key: QueryKey,
  ttl: Option<Duration>,
  fetcher: ErasedFetcher,
}

impl FetchDescriptor {
  /// Describe a typed fetch under `name`. The payload is type-erased for
  /// storage; read it back with [`AggregateOutcome::get`].
  pub fn new<T, F, Fut>(name: impl Into<String>, key: QueryKey, fetcher: F) -> Self
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    Self {
      name: name.into(),
      key,
      ttl: None,
      fetcher: Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(|v| Arc::new(v) as CachedValue) }.boxed()
      }),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = Some(ttl);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

/// Result of one settle-all pass: every name lands in exactly one map.
#[derive(Default, Clone)]
pub struct AggregateOutcome {
  results: HashMap<String, CachedValue>,
  errors: HashMap<String, FetchError>,
}

impl AggregateOutcome {
  /// Downcast a named success.
  pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
    self.results.get(name)?.clone().downcast::<T>().ok()
  }

  pub fn error(&self, name: &str) -> Option<&FetchError> {
    self.errors.get(name)
  }

  pub fn errors(&self) -> &HashMap<String, FetchError> {
    &self.errors
  }

  pub fn succeeded(&self) -> usize {
    self.results.len()
  }

  pub fn has_errors(&self) -> bool {
    !self.errors.is_empty()
  }

  /// Some names succeeded and some failed.
  pub fn is_partial(&self) -> bool {
    !self.results.is_empty() && !self.errors.is_empty()
  }
}

/// A named set of fetches resolved through one shared cache.
pub struct ResourceSet {
  cache: Arc<CacheLayer>,
  descriptors: Vec<FetchDescriptor>,
  loading: bool,
  started: bool,
  outcome: AggregateOutcome,
}

impl ResourceSet {
  pub fn new(cache: Arc<CacheLayer>, descriptors: Vec<FetchDescriptor>) -> Self {
    Self {
      cache,
      descriptors,
      loading: false,
      started: false,
      outcome: AggregateOutcome::default(),
    }
  }

  /// The automatic initial pass: runs `fetch_all(false)` the first time it
  /// is called, afterwards returns the last outcome untouched.
  pub async fn load(&mut self) -> AggregateOutcome {
    if self.started {
      return self.outcome.clone();
    }
    self.started = true;
    self.fetch_all(false).await
  }

  /// On-demand full re-fetch, bypassing cached entries.
  pub async fn refresh(&mut self) -> AggregateOutcome {
    self.fetch_all(true).await
  }

  /// Resolve every descriptor concurrently. Each one independently goes
  /// cache-hit-or-fetch (`force` bypasses the cache read); failures are
  /// collected per name, never propagated, so this method itself cannot
  /// fail.
  pub async fn fetch_all(&mut self, force: bool) -> AggregateOutcome {
    self.loading = true;
    self.started = true;

    let passes = self.descriptors.iter().map(|descriptor| {
      let cache = Arc::clone(&self.cache);
      let name = descriptor.name.clone();
      let key = descriptor.key.clone();
      let ttl = descriptor.ttl;
      let fetcher = Arc::clone(&descriptor.fetcher);
      async move {
        let result = cache
          .fetch_erased(&key, ttl, force, move || (*fetcher)())
          .await;
        (name, result)
      }
    });

    let settled = futures::future::join_all(passes).await;

    let mut outcome = AggregateOutcome::default();
    for (name, result) in settled {
      match result {
        Ok(value) => {
          outcome.results.insert(name, value);
        }
        Err(err) => {
          tracing::debug!(name, error = %err, "aggregate member failed");
          outcome.errors.insert(name, err);
        }
      }
    }

    self.loading = false;
    self.outcome = outcome.clone();
    outcome
  }

  /// True while a `fetch_all` pass is outstanding.
  pub fn loading(&self) -> bool {
    self.loading
  }

  /// Errors from the last pass, by name.
  pub fn errors(&self) -> &HashMap<String, FetchError> {
    self.outcome.errors()
  }

  /// The last pass's outcome.
  pub fn outcome(&self) -> &AggregateOutcome {
    &self.outcome
  }
}

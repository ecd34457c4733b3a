//! In-flight request deduplication.
//!
//! Concurrent callers asking for the same key inside one unsettled window
//! share a single execution of the underlying fetch; every caller observes
//! the identical resolution or rejection.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::store::CachedValue;
use crate::error::FetchError;

pub type FlightResult = Result<CachedValue, FetchError>;
type SharedFlight = Shared<BoxFuture<'static, FlightResult>>;

type PendingMap = Arc<Mutex<HashMap<String, SharedFlight>>>;

/// Tracks unsettled fetches by cache key.
///
/// At most one entry per key exists at any instant. The entry is removed
/// inside the shared future itself, immediately after the underlying fetch
/// settles and before any caller observes the result — success or failure, so
/// a dead entry can never block future requests for the key.
#[derive(Default)]
pub struct FlightTracker {
  pending: PendingMap,
}

impl FlightTracker {
  pub fn new() -> Self {
    Self {
      pending: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Number of currently unsettled fetches.
  pub fn len(&self) -> usize {
    self.pending.lock().map(|p| p.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Forget all unsettled registrations. Callers already joined on a shared
  /// future still observe its outcome; later requests start fresh.
  pub fn clear(&self) {
    if let Ok(mut pending) = self.pending.lock() {
      pending.clear();
    }
  }

  /// Run `make_fut` deduplicated under `key`.
  ///
  /// When an execution for `key` is already unsettled, `make_fut` is not
  /// invoked at all — the caller joins the in-flight future. Otherwise the
  /// built future is registered and driven; the winning execution's outcome
  /// is cloned out to every joined caller.
  pub async fn run<F>(&self, key: &str, make_fut: F) -> FlightResult
  where
    F: FnOnce() -> BoxFuture<'static, FlightResult>,
  {
    let flight = {
      let Ok(mut pending) = self.pending.lock() else {
        // Poisoned map: fall back to an un-deduplicated execution.
        return make_fut().await;
      };

      if let Some(inflight) = pending.get(key) {
        tracing::debug!(key, "joining in-flight fetch");
        inflight.clone()
      } else {
        let inner = make_fut();
        let cleanup_map = Arc::clone(&self.pending);
        let cleanup_key = key.to_string();
        // Settle-time cleanup runs inside the shared future, exactly once,
        // whichever caller ends up driving it.
        let flight: SharedFlight = async move {
          let result = inner.await;
          if let Ok(mut pending) = cleanup_map.lock() {
            pending.remove(&cleanup_key);
          }
          result
        }
        .boxed()
        .shared();
        pending.insert(key.to_string(), flight.clone());
        flight
      }
    };

    flight.await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn flight_ok(value: u32) -> FlightResult {
    Ok(Arc::new(value) as CachedValue)
  }

  #[tokio::test]
  async fn test_concurrent_callers_share_one_execution() {
    let flights = FlightTracker::new();
    let calls = Arc::new(AtomicU32::new(0));

    let make = |calls: Arc<AtomicU32>| {
      move || {
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(20)).await;
          flight_ok(7)
        }
        .boxed()
      }
    };

    let (a, b, c) = tokio::join!(
      flights.run("k", make(calls.clone())),
      flights.run("k", make(calls.clone())),
      flights.run("k", make(calls.clone())),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in [a, b, c] {
      let value = result.unwrap().downcast::<u32>().unwrap();
      assert_eq!(*value, 7);
    }
    assert!(flights.is_empty());
  }

  #[tokio::test]
  async fn test_rejection_is_shared_and_entry_removed() {
    let flights = FlightTracker::new();
    let calls = Arc::new(AtomicU32::new(0));

    let make = |calls: Arc<AtomicU32>| {
      move || {
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(20)).await;
          Err(FetchError::network("connection reset"))
        }
        .boxed()
      }
    };

    let (a, b) = tokio::join!(
      flights.run("k", make(calls.clone())),
      flights.run("k", make(calls.clone())),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap_err(), FetchError::network("connection reset"));
    assert_eq!(b.unwrap_err(), FetchError::network("connection reset"));

    // Failure must not leave a dead registration behind.
    assert!(flights.is_empty());
    flights.run("k", || async { flight_ok(1) }.boxed()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_distinct_keys_run_independently() {
    let flights = FlightTracker::new();
    let calls = Arc::new(AtomicU32::new(0));

    let make = |calls: Arc<AtomicU32>, v: u32| {
      move || {
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          flight_ok(v)
        }
        .boxed()
      }
    };

    let (a, b) = tokio::join!(
      flights.run("k1", make(calls.clone(), 1)),
      flights.run("k2", make(calls.clone(), 2)),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*a.unwrap().downcast::<u32>().unwrap(), 1);
    assert_eq!(*b.unwrap().downcast::<u32>().unwrap(), 2);
  }

  #[tokio::test]
  async fn test_sequential_calls_execute_each_time() {
    let flights = FlightTracker::new();
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..2 {
      let calls = calls.clone();
      flights
        .run("k", move || {
          async move {
            calls.fetch_add(1, Ordering::SeqCst);
            flight_ok(0)
          }
          .boxed()
        })
        .await
        .unwrap();
    }

    // The dedup window closes at settlement; sequential calls are separate
    // executions.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}

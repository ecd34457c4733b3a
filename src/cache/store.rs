//! In-memory TTL store for fetched payloads.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Entry lifetime used when the caller does not specify one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Type-erased cached payload. Different resources store different types
/// under the same store; readers downcast through [`CacheStore::get_as`].
pub type CachedValue = Arc<dyn Any + Send + Sync>;

struct CacheSlot {
  value: CachedValue,
  stored_at: DateTime<Utc>,
  deadline: Instant,
}

impl CacheSlot {
  /// An entry is visible while `now <= deadline`; the first read strictly
  /// past the deadline evicts it.
  fn expired(&self, now: Instant) -> bool {
    now > self.deadline
  }
}

/// In-memory key/value store with per-entry expiry.
///
/// Purely synchronous. Expired entries are deleted lazily by the next read or
/// write touching the key — there is no background sweep. Constructed
/// explicitly and shared by reference; the process-wide instance lives inside
/// [`CacheLayer`](super::CacheLayer).
pub struct CacheStore {
  entries: Mutex<HashMap<String, CacheSlot>>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Look up a live entry. Returns `None` and evicts when the entry is past
  /// its deadline; otherwise returns the stored value with no side effects.
  pub fn get(&self, key: &str) -> Option<CachedValue> {
    let Ok(mut entries) = self.entries.lock() else {
      return None;
    };

    if let Some(slot) = entries.get(key) {
      if !slot.expired(Instant::now()) {
        return Some(Arc::clone(&slot.value));
      }
    } else {
      return None;
    }

    tracing::debug!(key, "cache entry expired");
    entries.remove(key);
    None
  }

  /// Typed lookup. A stored value that does not downcast to `T` is treated
  /// as a miss and evicted — it can only arise from two resources sharing a
  /// key tag.
  pub fn get_as<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
    match self.get(key)?.downcast::<T>() {
      Ok(value) => Some(value),
      Err(_) => {
        tracing::debug!(key, "cache entry has unexpected payload type, evicting");
        self.invalidate(key);
        None
      }
    }
  }

  /// When the live entry under `key` was stored.
  pub fn stored_at(&self, key: &str) -> Option<DateTime<Utc>> {
    let entries = self.entries.lock().ok()?;
    entries
      .get(key)
      .filter(|slot| !slot.expired(Instant::now()))
      .map(|slot| slot.stored_at)
  }

  /// Insert or overwrite an entry with the given lifetime.
  pub fn set(&self, key: &str, value: CachedValue, ttl: Duration) {
    let Ok(mut entries) = self.entries.lock() else {
      return;
    };

    tracing::debug!(key, ttl_secs = ttl.as_secs(), "cache store");
    entries.insert(
      key.to_string(),
      CacheSlot {
        value,
        stored_at: Utc::now(),
        deadline: Instant::now() + ttl,
      },
    );
  }

  /// Exact-key removal. Returns whether an entry was present.
  pub fn invalidate(&self, key: &str) -> bool {
    let Ok(mut entries) = self.entries.lock() else {
      return false;
    };
    entries.remove(key).is_some()
  }

  /// Remove every entry whose key matches `pattern`. Returns the count
  /// removed.
  pub fn invalidate_matching(&self, pattern: &Regex) -> usize {
    let Ok(mut entries) = self.entries.lock() else {
      return 0;
    };

    let before = entries.len();
    entries.retain(|key, _| !pattern.is_match(key));
    let removed = before - entries.len();
    if removed > 0 {
      tracing::debug!(pattern = pattern.as_str(), removed, "cache invalidation");
    }
    removed
  }

  /// Remove all entries.
  pub fn clear(&self) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.clear();
    }
  }

  /// Number of entries, counting expired-but-not-yet-evicted ones.
  pub fn len(&self) -> usize {
    self.entries.lock().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for CacheStore {
  fn default() -> Self {
    Self::new()
  }
}

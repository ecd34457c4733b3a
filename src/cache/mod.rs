//! Shared caching machinery for the data layer.
//!
//! This module provides the pieces every fetch routes through:
//! - a TTL store with lazy expiry (no background sweep, no size bound)
//! - in-flight deduplication so concurrent requests for one key share one
//!   execution
//! - deterministic cache keys from explicit resource tags plus argument
//!   serialization
//! - the [`CacheLayer`] tying the three together with cache-first resolution
//!   and forced-bypass refresh

mod flight;
mod key;
mod layer;
mod store;

pub use flight::FlightTracker;
pub use key::QueryKey;
pub use layer::{CacheLayer, CacheStats};
pub use store::{CacheStore, CachedValue, DEFAULT_TTL};

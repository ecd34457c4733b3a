//! Caching and data-fetching core for the trackdash IoT fleet dashboard.
//!
//! Everything the presentation layer reads goes through one shared
//! [`CacheLayer`]: a TTL cache with in-flight request deduplication. On top
//! of it sit [`Resource`] handles (one fetchable resource with
//! data/loading/error state), [`aggregate::ResourceSet`] for named fan-out
//! with settle-all semantics, and the telemetry/dashboard composers that turn
//! cached device payloads into view models with graceful degradation.
//!
//! The transport itself is a collaborator, consumed through
//! [`telemetry::DeviceTransport`]; it owns timeouts, retries and payload
//! validation and settles every call with a value or a typed
//! [`FetchError`].

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod resource;
pub mod telemetry;

pub use cache::{CacheLayer, CacheStats, QueryKey};
pub use config::Config;
pub use dashboard::DashboardComposer;
pub use error::FetchError;
pub use resource::Resource;
pub use telemetry::{CachedDeviceClient, TelemetryComposer};

//! Query keys for device API calls.

use serde_json::json;

use crate::cache::QueryKey;

/// Query key types for the device API.
///
/// Each variant maps to a registered resource tag, so pattern invalidation
/// can target a family (`^device_analytics:`) and two queries can never
/// collide on equal arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceQuery {
  /// Telemetry history for one device
  Analytics { device_id: String },
  /// Health report for one device
  Health { device_id: String },
  /// All devices in the fleet
  FleetDevices,
  /// Open alerts across the fleet
  FleetAlerts,
}

impl DeviceQuery {
  pub fn analytics(device_id: impl Into<String>) -> Self {
    Self::Analytics {
      device_id: device_id.into(),
    }
  }

  pub fn health(device_id: impl Into<String>) -> Self {
    Self::Health {
      device_id: device_id.into(),
    }
  }

  pub fn key(&self) -> QueryKey {
    match self {
      Self::Analytics { device_id } => QueryKey::for_args("device_analytics", json!([device_id])),
      Self::Health { device_id } => QueryKey::for_args("device_health", json!([device_id])),
      Self::FleetDevices => QueryKey::bare("fleet_devices"),
      Self::FleetAlerts => QueryKey::bare("fleet_alerts"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_same_query_same_key() {
    let a = DeviceQuery::analytics("dev-42").key();
    let b = DeviceQuery::analytics("dev-42").key();
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_analytics_and_health_never_collide() {
    let a = DeviceQuery::analytics("dev-42").key();
    let h = DeviceQuery::health("dev-42").key();
    assert_ne!(a.cache_hash(), h.cache_hash());
  }

  #[test]
  fn test_tags_are_family_prefixes() {
    assert!(DeviceQuery::analytics("x")
      .key()
      .cache_hash()
      .starts_with("device_analytics:"));
    assert!(DeviceQuery::FleetAlerts
      .key()
      .cache_hash()
      .starts_with("fleet_alerts:"));
  }
}

//! Fleet dashboard view-model composer.
//!
//! Fans the fleet-level resources out through a [`ResourceSet`] and derives
//! the dashboard counters. Per-name degradation: a failed member zeroes its
//! own section of the view and shows up in `errors()`, nothing else.

use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregate::{AggregateOutcome, FetchDescriptor, ResourceSet};
use crate::error::FetchError;
use crate::telemetry::{
  CachedDeviceClient, DashboardViewModel, DeviceQuery, DeviceSummary, DeviceTransport, FleetAlert,
};

/// How many alerts the dashboard lists before presentation paginates.
const RECENT_ALERT_LIMIT: usize = 5;

pub struct DashboardComposer {
  set: ResourceSet,
}

impl DashboardComposer {
  pub fn new(client: &CachedDeviceClient) -> Self {
    let transport = Arc::clone(client.transport());
    let fleet_ttl = client.ttls().fleet_ttl();

    let devices = FetchDescriptor::new("devices", DeviceQuery::FleetDevices.key(), {
      let transport: Arc<dyn DeviceTransport> = Arc::clone(&transport);
      move || {
        let transport = Arc::clone(&transport);
        async move { transport.fleet_devices().await }
      }
    })
    .with_ttl(fleet_ttl);

    let alerts = FetchDescriptor::new("alerts", DeviceQuery::FleetAlerts.key(), {
      let transport: Arc<dyn DeviceTransport> = transport;
      move || {
        let transport = Arc::clone(&transport);
        async move { transport.fleet_alerts().await }
      }
    })
    .with_ttl(fleet_ttl);

    Self {
      set: ResourceSet::new(Arc::clone(client.cache()), vec![devices, alerts]),
    }
  }

  /// Initial resolution (cache-first).
  pub async fn load(&mut self) -> DashboardViewModel {
    let outcome = self.set.load().await;
    Self::derive(&outcome)
  }

  /// Full re-fetch bypassing cached entries.
  pub async fn refresh(&mut self) -> DashboardViewModel {
    let outcome = self.set.refresh().await;
    Self::derive(&outcome)
  }

  /// The view derived from the last pass.
  pub fn view_model(&self) -> DashboardViewModel {
    Self::derive(self.set.outcome())
  }

  pub fn loading(&self) -> bool {
    self.set.loading()
  }

  pub fn errors(&self) -> &HashMap<String, FetchError> {
    self.set.errors()
  }

  /// The dashboard is usable once the device listing resolved; alerts only
  /// enrich it.
  pub fn has_data(&self) -> bool {
    self.set.outcome().get::<Vec<DeviceSummary>>("devices").is_some()
  }

  fn derive(outcome: &AggregateOutcome) -> DashboardViewModel {
    let mut view = DashboardViewModel::default();

    if let Some(devices) = outcome.get::<Vec<DeviceSummary>>("devices") {
      view.device_count = devices.len();
      view.online_count = devices.iter().filter(|d| d.online).count();
      view.offline_count = view.device_count - view.online_count;
    }

    if let Some(alerts) = outcome.get::<Vec<FleetAlert>>("alerts") {
      view.alert_count = alerts.len();
      view.critical_alert_count = alerts.iter().filter(|a| a.severity == "critical").count();

      let mut recent: Vec<FleetAlert> = alerts.as_ref().clone();
      // RFC 3339 sorts lexicographically; missing timestamps sink to the end.
      recent.sort_by(|a, b| b.raised_at.cmp(&a.raised_at));
      recent.truncate(RECENT_ALERT_LIMIT);
      view.recent_alerts = recent;
    }

    view
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheLayer;
  use crate::config::CacheConfig;
  use crate::telemetry::{CommandAck, DeviceCommand, DeviceHealth, TelemetryPacket};
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicBool, Ordering};

  struct FleetTransport {
    alerts_down: AtomicBool,
  }

  #[async_trait]
  impl DeviceTransport for FleetTransport {
    async fn device_analytics(&self, _: &str) -> Result<Vec<TelemetryPacket>, FetchError> {
      Ok(Vec::new())
    }

    async fn device_health(&self, _: &str) -> Result<DeviceHealth, FetchError> {
      Err(FetchError::api("not implemented", Some(501), false))
    }

    async fn fleet_devices(&self) -> Result<Vec<DeviceSummary>, FetchError> {
      Ok(vec![
        DeviceSummary {
          id: "dev-1".to_string(),
          name: "Tracker 1".to_string(),
          online: true,
        },
        DeviceSummary {
          id: "dev-2".to_string(),
          name: "Tracker 2".to_string(),
          online: false,
        },
        DeviceSummary {
          id: "dev-3".to_string(),
          name: "Tracker 3".to_string(),
          online: true,
        },
      ])
    }

    async fn fleet_alerts(&self) -> Result<Vec<FleetAlert>, FetchError> {
      if self.alerts_down.load(Ordering::SeqCst) {
        return Err(FetchError::network("alerts endpoint unreachable"));
      }
      Ok(vec![
        FleetAlert {
          id: "a-1".to_string(),
          device_id: "dev-2".to_string(),
          severity: "critical".to_string(),
          message: "left geofence".to_string(),
          raised_at: Some("2026-08-01T09:00:00Z".to_string()),
        },
        FleetAlert {
          id: "a-2".to_string(),
          device_id: "dev-1".to_string(),
          severity: "warning".to_string(),
          message: "battery low".to_string(),
          raised_at: Some("2026-08-01T11:00:00Z".to_string()),
        },
      ])
    }

    async fn send_command(&self, _: &str, c: &DeviceCommand) -> Result<CommandAck, FetchError> {
      Ok(CommandAck {
        command: c.name.clone(),
        accepted: false,
      })
    }
  }

  fn composer(alerts_down: bool) -> DashboardComposer {
    let client = CachedDeviceClient::new(
      Arc::new(FleetTransport {
        alerts_down: AtomicBool::new(alerts_down),
      }),
      Arc::new(CacheLayer::new()),
      CacheConfig::default(),
    );
    DashboardComposer::new(&client)
  }

  #[tokio::test]
  async fn test_full_view_with_all_resources() {
    let mut dashboard = composer(false);
    let view = dashboard.load().await;

    assert_eq!(view.device_count, 3);
    assert_eq!(view.online_count, 2);
    assert_eq!(view.offline_count, 1);
    assert_eq!(view.alert_count, 2);
    assert_eq!(view.critical_alert_count, 1);
    // Newest alert first.
    assert_eq!(view.recent_alerts[0].id, "a-2");
    assert!(dashboard.errors().is_empty());
    assert!(dashboard.has_data());
  }

  #[tokio::test]
  async fn test_failed_alerts_zero_their_section_only() {
    let mut dashboard = composer(true);
    let view = dashboard.load().await;

    assert_eq!(view.device_count, 3);
    assert_eq!(view.alert_count, 0);
    assert!(view.recent_alerts.is_empty());
    assert!(dashboard.has_data());
    assert_eq!(dashboard.errors().len(), 1);
    assert_eq!(
      dashboard.errors().get("alerts"),
      Some(&FetchError::network("alerts endpoint unreachable"))
    );
  }

  #[tokio::test]
  async fn test_view_model_matches_last_pass() {
    let mut dashboard = composer(false);
    assert_eq!(dashboard.view_model(), DashboardViewModel::default());

    dashboard.load().await;
    assert_eq!(dashboard.view_model().device_count, 3);
  }
}

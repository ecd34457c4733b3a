//! Device API transport contract and the cached client over it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cache::CacheLayer;
use crate::config::CacheConfig;
use crate::error::FetchError;

use super::keys::DeviceQuery;
use super::types::{CommandAck, DeviceCommand, DeviceHealth, DeviceSummary, FleetAlert, TelemetryPacket};

/// The fetch contract this layer consumes.
///
/// Implementations own request timeout, retry-with-backoff on transient
/// failures and truncated-payload detection; by the time a call settles here
/// it is a final resolution or a final typed rejection.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
  async fn device_analytics(&self, device_id: &str) -> Result<Vec<TelemetryPacket>, FetchError>;

  async fn device_health(&self, device_id: &str) -> Result<DeviceHealth, FetchError>;

  async fn fleet_devices(&self) -> Result<Vec<DeviceSummary>, FetchError>;

  async fn fleet_alerts(&self) -> Result<Vec<FleetAlert>, FetchError>;

  async fn send_command(
    &self,
    device_id: &str,
    command: &DeviceCommand,
  ) -> Result<CommandAck, FetchError>;
}

/// Check a device identifier before it reaches the wire.
pub fn validate_device_id(device_id: &str) -> Result<(), FetchError> {
  if device_id.is_empty() {
    return Err(FetchError::validation("device id must not be empty"));
  }
  if !device_id
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
  {
    return Err(FetchError::validation(format!(
      "device id `{device_id}` contains invalid characters"
    )));
  }
  Ok(())
}

/// Device client with transparent caching support.
///
/// Wraps a [`DeviceTransport`] and provides the same read API, resolving
/// every query through the shared cache layer with per-resource TTLs.
/// Command dispatch is a write operation: never cached, and on acceptance it
/// invalidates the device's cached reads so the next resolution refetches.
#[derive(Clone)]
pub struct CachedDeviceClient {
  inner: Arc<dyn DeviceTransport>,
  cache: Arc<CacheLayer>,
  ttls: CacheConfig,
}

impl CachedDeviceClient {
  pub fn new(inner: Arc<dyn DeviceTransport>, cache: Arc<CacheLayer>, ttls: CacheConfig) -> Self {
    Self { inner, cache, ttls }
  }

  pub fn cache(&self) -> &Arc<CacheLayer> {
    &self.cache
  }

  pub fn transport(&self) -> &Arc<dyn DeviceTransport> {
    &self.inner
  }

  pub fn ttls(&self) -> &CacheConfig {
    &self.ttls
  }

  /// Telemetry history for one device, cached.
  pub async fn device_analytics(
    &self,
    device_id: &str,
  ) -> Result<Arc<Vec<TelemetryPacket>>, FetchError> {
    validate_device_id(device_id)?;
    let key = DeviceQuery::analytics(device_id).key();
    let inner = Arc::clone(&self.inner);
    let device_id = device_id.to_string();
    self
      .cache
      .fetch_through(&key, Some(self.ttls.analytics_ttl()), false, move || {
        async move { inner.device_analytics(&device_id).await }
      })
      .await
  }

  /// Health report for one device, cached.
  pub async fn device_health(&self, device_id: &str) -> Result<Arc<DeviceHealth>, FetchError> {
    validate_device_id(device_id)?;
    let key = DeviceQuery::health(device_id).key();
    let inner = Arc::clone(&self.inner);
    let device_id = device_id.to_string();
    self
      .cache
      .fetch_through(&key, Some(self.ttls.health_ttl()), false, move || {
        async move { inner.device_health(&device_id).await }
      })
      .await
  }

  /// Fleet listing, cached.
  pub async fn fleet_devices(&self) -> Result<Arc<Vec<DeviceSummary>>, FetchError> {
    let key = DeviceQuery::FleetDevices.key();
    let inner = Arc::clone(&self.inner);
    self
      .cache
      .fetch_through(&key, Some(self.ttls.fleet_ttl()), false, move || {
        async move { inner.fleet_devices().await }
      })
      .await
  }

  /// Open alerts, cached.
  pub async fn fleet_alerts(&self) -> Result<Arc<Vec<FleetAlert>>, FetchError> {
    let key = DeviceQuery::FleetAlerts.key();
    let inner = Arc::clone(&self.inner);
    self
      .cache
      .fetch_through(&key, Some(self.ttls.fleet_ttl()), false, move || {
        async move { inner.fleet_alerts().await }
      })
      .await
  }

  /// Dispatch a command (not cached - write operation).
  ///
  /// An accepted command makes the device's cached analytics and health
  /// stale by definition, so both entries are dropped.
  pub async fn send_command(
    &self,
    device_id: &str,
    command: &DeviceCommand,
  ) -> Result<CommandAck, FetchError> {
    validate_device_id(device_id)?;
    if command.name.is_empty() {
      return Err(FetchError::validation("command name must not be empty"));
    }

    let ack = self.inner.send_command(device_id, command).await?;
    if ack.accepted {
      self.cache.invalidate(&DeviceQuery::analytics(device_id).key());
      self.cache.invalidate(&DeviceQuery::health(device_id).key());
      tracing::debug!(device_id, command = %command.name, "command accepted, cached reads dropped");
    }
    Ok(ack)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  /// Transport stub with programmable failures and call counting.
  pub(crate) struct StubTransport {
    pub analytics_calls: AtomicU32,
    pub health_calls: AtomicU32,
    pub fail_analytics: bool,
    pub fail_health: bool,
    pub packets: Vec<TelemetryPacket>,
  }

  impl StubTransport {
    pub(crate) fn new(packets: Vec<TelemetryPacket>) -> Self {
      Self {
        analytics_calls: AtomicU32::new(0),
        health_calls: AtomicU32::new(0),
        fail_analytics: false,
        fail_health: false,
        packets,
      }
    }
  }

  #[async_trait]
  impl DeviceTransport for StubTransport {
    async fn device_analytics(&self, device_id: &str) -> Result<Vec<TelemetryPacket>, FetchError> {
      self.analytics_calls.fetch_add(1, Ordering::SeqCst);
      if self.fail_analytics {
        return Err(FetchError::network("telemetry endpoint unreachable"));
      }
      let _ = device_id;
      Ok(self.packets.clone())
    }

    async fn device_health(&self, device_id: &str) -> Result<DeviceHealth, FetchError> {
      self.health_calls.fetch_add(1, Ordering::SeqCst);
      if self.fail_health {
        return Err(FetchError::api("health service error", Some(503), true));
      }
      Ok(DeviceHealth {
        device_id: device_id.to_string(),
        uptime_secs: Some(7_200),
        connectivity: Some("lte".to_string()),
        firmware_version: Some("2.4.1".to_string()),
        last_seen: Some("2026-08-01T10:00:00Z".to_string()),
      })
    }

    async fn fleet_devices(&self) -> Result<Vec<DeviceSummary>, FetchError> {
      Ok(vec![DeviceSummary {
        id: "dev-1".to_string(),
        name: "Tracker 1".to_string(),
        online: true,
      }])
    }

    async fn fleet_alerts(&self) -> Result<Vec<FleetAlert>, FetchError> {
      Ok(Vec::new())
    }

    async fn send_command(
      &self,
      _device_id: &str,
      command: &DeviceCommand,
    ) -> Result<CommandAck, FetchError> {
      Ok(CommandAck {
        command: command.name.clone(),
        accepted: true,
      })
    }
  }

  fn sample_packet() -> TelemetryPacket {
    TelemetryPacket {
      device_id: "dev-1".to_string(),
      recorded_at: Some("2026-08-01T10:00:00Z".to_string()),
      battery: Some(80.0),
      raw_temperature: Some(30.0),
      latitude: None,
      longitude: None,
      speed_kmh: None,
      rssi: None,
      synthetic: false,
    }
  }

  fn client_with(transport: StubTransport) -> CachedDeviceClient {
    CachedDeviceClient::new(
      Arc::new(transport),
      Arc::new(CacheLayer::new()),
      CacheConfig::default(),
    )
  }

  #[tokio::test]
  async fn test_analytics_cached_between_calls() {
    let transport = Arc::new(StubTransport::new(vec![sample_packet()]));
    let client = CachedDeviceClient::new(
      Arc::clone(&transport) as Arc<dyn DeviceTransport>,
      Arc::new(CacheLayer::new()),
      CacheConfig::default(),
    );

    let first = client.device_analytics("dev-1").await.unwrap();
    let second = client.device_analytics("dev-1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(transport.analytics_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_bad_device_id_is_a_validation_error() {
    let client = client_with(StubTransport::new(Vec::new()));

    let err = client.device_analytics("").await.unwrap_err();
    assert_eq!(err.category(), "validation");
    assert!(!err.retryable());

    let err = client.device_analytics("dev/../etc").await.unwrap_err();
    assert_eq!(err.category(), "validation");
  }

  #[tokio::test]
  async fn test_accepted_command_invalidates_device_reads() {
    let transport = Arc::new(StubTransport::new(vec![sample_packet()]));
    let client = CachedDeviceClient::new(
      Arc::clone(&transport) as Arc<dyn DeviceTransport>,
      Arc::new(CacheLayer::new()),
      CacheConfig::default(),
    );

    client.device_analytics("dev-1").await.unwrap();
    client.device_health("dev-1").await.unwrap();

    let ack = client
      .send_command(
        "dev-1",
        &DeviceCommand {
          name: "reboot".to_string(),
          params: serde_json::Value::Null,
        },
      )
      .await
      .unwrap();
    assert!(ack.accepted);

    client.device_analytics("dev-1").await.unwrap();
    client.device_health("dev-1").await.unwrap();
    assert_eq!(transport.analytics_calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.health_calls.load(Ordering::SeqCst), 2);
  }
}

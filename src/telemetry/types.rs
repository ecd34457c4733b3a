//! Device domain payloads and the derived telemetry view model.
//!
//! Transport payloads keep every field optional — device firmware in the
//! field sends incomplete packets, and the transform layer owns turning them
//! into something presentable.

use serde::{Deserialize, Serialize};

/// One telemetry report from a tracking device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPacket {
  pub device_id: String,
  /// RFC 3339 timestamp, as sent by the device. May be absent or garbage.
  pub recorded_at: Option<String>,
  /// Battery charge, percent.
  pub battery: Option<f64>,
  /// Uncalibrated temperature reading, °C.
  pub raw_temperature: Option<f64>,
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  pub speed_kmh: Option<f64>,
  /// Signal strength, dBm.
  pub rssi: Option<f64>,
  /// Marks the locally generated placeholder packet. Never set by real
  /// devices.
  #[serde(default)]
  pub synthetic: bool,
}

/// Health report for a device, served by a secondary endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceHealth {
  pub device_id: String,
  pub uptime_secs: Option<u64>,
  /// Link type as reported ("lte", "wifi", ...).
  pub connectivity: Option<String>,
  pub firmware_version: Option<String>,
  /// RFC 3339 timestamp of the last check-in.
  pub last_seen: Option<String>,
}

/// Fleet listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
  pub id: String,
  pub name: String,
  pub online: bool,
}

/// Geofence or sensor alert raised for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetAlert {
  pub id: String,
  pub device_id: String,
  /// "critical", "warning" or "info".
  pub severity: String,
  pub message: String,
  pub raised_at: Option<String>,
}

/// Command sent to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
  pub name: String,
  #[serde(default)]
  pub params: serde_json::Value,
}

/// Transport acknowledgement for a dispatched command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
  pub command: String,
  pub accepted: bool,
}

// ============================================================================
// Derived view model
// ============================================================================

/// Latest-reading section of the telemetry view.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTelemetry {
  pub battery: f64,
  pub temperature_c: f64,
  pub has_high_temp: bool,
  pub low_battery: bool,
  pub speed_kmh: f64,
  /// (latitude, longitude) when the packet carried a fix.
  pub position: Option<(f64, f64)>,
  /// Formatted timestamp, "Unknown" or "Invalid Date" when degraded.
  pub recorded_at: String,
}

/// One chart sample derived from a packet.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
  pub recorded_at: String,
  pub temperature_c: f64,
  pub battery: f64,
  pub speed_kmh: f64,
}

/// Health section of the telemetry view. Every field degrades to an
/// explicit "Unknown" rather than being absent.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSummary {
  pub connectivity: String,
  pub firmware_version: String,
  pub uptime: String,
  pub last_seen: String,
}

/// The transformed shape the telemetry screen renders from.
///
/// Always well-formed: missing critical data leaves `live` empty and
/// `history` zero-length instead of failing the whole view.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryViewModel {
  pub device_id: String,
  pub live: Option<LiveTelemetry>,
  pub history: Vec<HistoryPoint>,
  pub health: Option<HealthSummary>,
  /// True when the view is built from the locally generated placeholder
  /// packet rather than device data.
  pub is_fallback: bool,
}

impl TelemetryViewModel {
  /// The well-formed all-empty shape for a device nothing has resolved for.
  pub fn empty(device_id: impl Into<String>) -> Self {
    Self {
      device_id: device_id.into(),
      live: None,
      history: Vec::new(),
      health: None,
      is_fallback: false,
    }
  }
}

/// Fleet-level dashboard view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardViewModel {
  pub device_count: usize,
  pub online_count: usize,
  pub offline_count: usize,
  pub alert_count: usize,
  pub critical_alert_count: usize,
  /// Most recent alerts, newest first, capped for display.
  pub recent_alerts: Vec<FleetAlert>,
}

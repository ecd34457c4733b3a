//! Pure transforms from device payloads to the view model.
//!
//! Every function here is total: bad numbers coerce to defaults, bad
//! timestamps format as "Unknown" or "Invalid Date", and a packet with
//! nothing usable in it still produces a well-formed shape. Degradations are
//! reported as notes, not failures.

use chrono::DateTime;

use crate::config::TelemetryConfig;

use super::types::{
  DeviceHealth, HealthSummary, HistoryPoint, LiveTelemetry, TelemetryPacket, TelemetryViewModel,
};

/// Safe numeric coercion: missing, NaN or infinite values become `default`.
pub fn num_or(value: Option<f64>, default: f64) -> f64 {
  match value {
    Some(v) if v.is_finite() => v,
    _ => default,
  }
}

/// Safe text coercion for display fields.
pub fn text_or_unknown(value: Option<&str>) -> String {
  match value {
    Some(v) if !v.trim().is_empty() => v.to_string(),
    _ => "Unknown".to_string(),
  }
}

/// Format a device timestamp for display.
///
/// Missing input degrades to "Unknown", unparseable input to "Invalid Date";
/// never panics on garbage.
pub fn format_timestamp(raw: Option<&str>) -> String {
  let Some(raw) = raw else {
    return "Unknown".to_string();
  };
  match DateTime::parse_from_rfc3339(raw) {
    Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
    Err(_) => "Invalid Date".to_string(),
  }
}

/// Humanize an uptime duration.
pub fn format_uptime(uptime_secs: Option<u64>) -> String {
  let Some(secs) = uptime_secs else {
    return "Unknown".to_string();
  };
  let days = secs / 86_400;
  let hours = (secs % 86_400) / 3_600;
  let minutes = (secs % 3_600) / 60;
  if days > 0 {
    format!("{days}d {hours}h")
  } else if hours > 0 {
    format!("{hours}h {minutes}m")
  } else if minutes > 0 {
    format!("{minutes}m")
  } else {
    format!("{secs}s")
  }
}

/// The packet to treat as the current reading: the newest parseable
/// timestamp wins, otherwise the last packet in delivery order.
pub fn latest_packet(packets: &[TelemetryPacket]) -> Option<&TelemetryPacket> {
  packets
    .iter()
    .filter_map(|p| {
      let raw = p.recorded_at.as_deref()?;
      let dt = DateTime::parse_from_rfc3339(raw).ok()?;
      Some((dt, p))
    })
    .max_by_key(|(dt, _)| *dt)
    .map(|(_, p)| p)
    .or_else(|| packets.last())
}

/// Derive the latest-reading section from one packet.
pub fn live_from_packet(packet: &TelemetryPacket, thresholds: &TelemetryConfig) -> LiveTelemetry {
  let battery = num_or(packet.battery, 0.0);
  let temperature_c = num_or(packet.raw_temperature, 0.0);
  let position = match (packet.latitude, packet.longitude) {
    (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
    _ => None,
  };

  LiveTelemetry {
    battery,
    temperature_c,
    has_high_temp: temperature_c > thresholds.high_temp_c,
    low_battery: battery <= thresholds.low_battery_pct,
    speed_kmh: num_or(packet.speed_kmh, 0.0),
    position,
    recorded_at: format_timestamp(packet.recorded_at.as_deref()),
  }
}

/// Chart samples, one per packet, in delivery order.
pub fn history_points(packets: &[TelemetryPacket]) -> Vec<HistoryPoint> {
  packets
    .iter()
    .map(|p| HistoryPoint {
      recorded_at: format_timestamp(p.recorded_at.as_deref()),
      temperature_c: num_or(p.raw_temperature, 0.0),
      battery: num_or(p.battery, 0.0),
      speed_kmh: num_or(p.speed_kmh, 0.0),
    })
    .collect()
}

/// Health section with every field explicit.
pub fn health_summary(health: &DeviceHealth) -> HealthSummary {
  HealthSummary {
    connectivity: text_or_unknown(health.connectivity.as_deref()),
    firmware_version: text_or_unknown(health.firmware_version.as_deref()),
    uptime: format_uptime(health.uptime_secs),
    last_seen: format_timestamp(health.last_seen.as_deref()),
  }
}

/// The locally generated placeholder used when the analytics fetch failed
/// with no data at all. Clearly synthetic: marked on the packet and surfaced
/// as `is_fallback` on the view model so presentation can label it — this is
/// a fallback-on-total-failure policy, not fabricated device state.
pub fn demo_packet(device_id: &str) -> TelemetryPacket {
  TelemetryPacket {
    device_id: device_id.to_string(),
    recorded_at: None,
    battery: Some(100.0),
    raw_temperature: Some(21.0),
    latitude: None,
    longitude: None,
    speed_kmh: Some(0.0),
    rssi: None,
    synthetic: true,
  }
}

/// Assemble the full view model from whatever resolved.
///
/// Returns the model plus degradation notes for the composer to record.
/// `packets = None` means the critical resource has not resolved; the result
/// is still well-formed with empty primary fields.
pub fn build_view_model(
  device_id: &str,
  packets: Option<&[TelemetryPacket]>,
  health: Option<&DeviceHealth>,
  thresholds: &TelemetryConfig,
) -> (TelemetryViewModel, Vec<String>) {
  let mut notes = Vec::new();
  let mut view = TelemetryViewModel::empty(device_id);

  if let Some(packets) = packets {
    view.is_fallback = packets.iter().any(|p| p.synthetic);
    view.history = history_points(packets);
    if let Some(latest) = latest_packet(packets) {
      let live = live_from_packet(latest, thresholds);
      if latest.battery.is_none() && latest.raw_temperature.is_none() && live.position.is_none() {
        notes.push(format!(
          "latest packet for {device_id} carried no readable telemetry"
        ));
      }
      view.live = Some(live);
    }
  }

  if let Some(health) = health {
    view.health = Some(health_summary(health));
  }

  (view, notes)
}

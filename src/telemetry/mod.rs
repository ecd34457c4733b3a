//! Device telemetry: transport contract, cached client, query keys, pure
//! transforms and the view-model composer.

mod client;
mod composer;
mod keys;
mod transform;
mod types;

pub use client::{validate_device_id, CachedDeviceClient, DeviceTransport};
pub use composer::{
  ComposerPhase, ErrorSeverity, ErrorSummaryEntry, PartialDataErrors, TelemetryComposer,
};
pub use keys::DeviceQuery;
pub use transform::{
  build_view_model, demo_packet, format_timestamp, format_uptime, health_summary, history_points,
  latest_packet, live_from_packet, num_or, text_or_unknown,
};
pub use types::{
  CommandAck, DashboardViewModel, DeviceCommand, DeviceHealth, DeviceSummary, FleetAlert,
  HealthSummary, HistoryPoint, LiveTelemetry, TelemetryPacket, TelemetryViewModel,
};

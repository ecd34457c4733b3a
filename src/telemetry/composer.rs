//! Telemetry view-model composer.
//!
//! Combines the critical analytics resource with the best-effort health
//! resource for one device. Analytics failing is the composer failing;
//! health failing only degrades the view. Both resources resolve through the
//! shared cache, so a composer and any other consumer of the same device
//! never duplicate a fetch.

use std::sync::Arc;

use futures::join;

use crate::config::TelemetryConfig;
use crate::error::FetchError;
use crate::resource::Resource;

use super::client::{CachedDeviceClient, DeviceTransport};
use super::keys::DeviceQuery;
use super::transform;
use super::types::{DeviceHealth, TelemetryPacket, TelemetryViewModel};

/// Where the composer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerPhase {
  /// No fetch attempted yet
  Idle,
  /// A fetch or refresh is outstanding
  Loading,
  /// Analytics resolved, health resolved
  Ready,
  /// Analytics resolved, health in error
  PartiallyReady,
  /// Analytics in error
  Errored,
}

/// How bad one summary entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
  /// The critical resource failed; the view is unusable
  Critical,
  /// A best-effort resource failed; the view is degraded
  Warning,
  /// The last user-driven refresh failed
  Refresh,
}

/// One row of the error summary presentation renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSummaryEntry {
  pub severity: ErrorSeverity,
  pub component: &'static str,
  pub error: FetchError,
  pub can_retry: bool,
}

/// Failures that degraded the view without failing it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartialDataErrors {
  pub health: Option<FetchError>,
  pub transformation: Option<String>,
}

impl PartialDataErrors {
  pub fn is_empty(&self) -> bool {
    self.health.is_none() && self.transformation.is_none()
  }
}

/// Derives [`TelemetryViewModel`] for one device from cached resources.
pub struct TelemetryComposer {
  device_id: String,
  thresholds: TelemetryConfig,
  analytics: Resource<Vec<TelemetryPacket>>,
  health: Resource<DeviceHealth>,
  started: bool,
  is_refreshing: bool,
  refresh_error: Option<FetchError>,
}

impl TelemetryComposer {
  /// Build a composer over the client's cache and transport.
  pub fn new(
    client: &CachedDeviceClient,
    device_id: impl Into<String>,
    thresholds: TelemetryConfig,
  ) -> Self {
    let device_id = device_id.into();
    let cache = Arc::clone(client.cache());
    let transport = Arc::clone(client.transport());

    let analytics = Resource::new(DeviceQuery::analytics(&device_id).key(), Arc::clone(&cache), {
      let transport: Arc<dyn DeviceTransport> = Arc::clone(&transport);
      let id = device_id.clone();
      move || {
        let transport = Arc::clone(&transport);
        let id = id.clone();
        async move { transport.device_analytics(&id).await }
      }
    })
    .with_ttl(client.ttls().analytics_ttl());

    let health = Resource::new(DeviceQuery::health(&device_id).key(), cache, {
      let transport: Arc<dyn DeviceTransport> = transport;
      let id = device_id.clone();
      move || {
        let transport = Arc::clone(&transport);
        let id = id.clone();
        async move { transport.device_health(&id).await }
      }
    })
    .with_ttl(client.ttls().health_ttl());

    Self {
      device_id,
      thresholds,
      analytics,
      health,
      started: false,
      is_refreshing: false,
      refresh_error: None,
    }
  }

  pub fn device_id(&self) -> &str {
    &self.device_id
  }

  /// Start both resources resolving (cache-first).
  pub fn fetch(&mut self) {
    self.started = true;
    self.analytics.fetch();
    self.health.fetch();
  }

  /// Apply settled results from either resource. Returns `true` when state
  /// changed.
  pub fn poll(&mut self) -> bool {
    // Deliberately not short-circuiting: both resources get drained.
    self.analytics.poll() | self.health.poll()
  }

  pub fn loading(&self) -> bool {
    self.analytics.loading() || self.health.loading() || self.is_refreshing
  }

  pub fn is_refreshing(&self) -> bool {
    self.is_refreshing
  }

  /// The composer's primary error: the critical resource's.
  pub fn error(&self) -> Option<&FetchError> {
    self.analytics.error()
  }

  pub fn has_data(&self) -> bool {
    self.analytics.data().is_some()
  }

  /// Critical data present but something degraded the view.
  pub fn has_partial_data(&self) -> bool {
    self.has_data() && !self.partial_errors().is_empty()
  }

  pub fn has_errors(&self) -> bool {
    self.analytics.error().is_some()
      || self.health.error().is_some()
      || self.refresh_error.is_some()
  }

  pub fn can_retry_analytics(&self) -> bool {
    self.analytics.error().is_some_and(|e| e.retryable())
  }

  pub fn can_retry_health(&self) -> bool {
    self.health.error().is_some_and(|e| e.retryable())
  }

  pub fn can_retry(&self) -> bool {
    self.can_retry_analytics() || self.can_retry_health()
  }

  pub fn phase(&self) -> ComposerPhase {
    if !self.started {
      ComposerPhase::Idle
    } else if self.loading() {
      ComposerPhase::Loading
    } else if self.analytics.error().is_some() {
      ComposerPhase::Errored
    } else if self.has_data() {
      if self.health.error().is_some() {
        ComposerPhase::PartiallyReady
      } else {
        ComposerPhase::Ready
      }
    } else {
      ComposerPhase::Idle
    }
  }

  /// The current view model, recomputed from resource state.
  ///
  /// Always well-formed. When analytics is in error with no data at all, the
  /// view is built from the synthetic placeholder packet and flagged
  /// `is_fallback`.
  pub fn view_model(&self) -> TelemetryViewModel {
    self.compose().0
  }

  /// Degradations recorded alongside the view: the health failure, if any,
  /// and transform notes.
  pub fn partial_errors(&self) -> PartialDataErrors {
    let notes = self.compose().1;
    PartialDataErrors {
      health: self.health.error().cloned(),
      transformation: if notes.is_empty() {
        None
      } else {
        Some(notes.join("; "))
      },
    }
  }

  /// Ordered error rows: critical first, then warnings, then refresh.
  pub fn error_summary(&self) -> Vec<ErrorSummaryEntry> {
    let mut entries = Vec::new();
    if let Some(err) = self.analytics.error() {
      entries.push(ErrorSummaryEntry {
        severity: ErrorSeverity::Critical,
        component: "analytics",
        error: err.clone(),
        can_retry: err.retryable(),
      });
    }
    if let Some(err) = self.health.error() {
      entries.push(ErrorSummaryEntry {
        severity: ErrorSeverity::Warning,
        component: "health",
        error: err.clone(),
        can_retry: err.retryable(),
      });
    }
    if let Some(err) = &self.refresh_error {
      entries.push(ErrorSummaryEntry {
        severity: ErrorSeverity::Refresh,
        component: "refresh",
        error: err.clone(),
        can_retry: err.retryable(),
      });
    }
    entries
  }

  /// User-driven refresh of both resources in parallel.
  ///
  /// The critical failure is re-raised; the health failure is swallowed here
  /// (logged and left in resource state) so a flaky health endpoint cannot
  /// fail a refresh that produced good telemetry.
  pub async fn refresh_data(&mut self) -> Result<Arc<Vec<TelemetryPacket>>, FetchError> {
    self.started = true;
    self.is_refreshing = true;
    let (analytics_result, health_result) =
      join!(self.analytics.refresh(), self.health.refresh());
    self.is_refreshing = false;

    if let Err(err) = &health_result {
      tracing::warn!(
        device_id = %self.device_id,
        error = %err,
        "health refresh failed, continuing with partial data"
      );
    }

    match analytics_result {
      Ok(packets) => {
        self.refresh_error = None;
        Ok(packets)
      }
      Err(err) => {
        self.refresh_error = Some(err.clone());
        Err(err)
      }
    }
  }

  /// Refresh only what is currently errored.
  ///
  /// A no-op (logged) when nothing is in error. An analytics retry failure
  /// is re-raised; a health-only retry failure is swallowed like any other
  /// non-critical failure.
  pub async fn retry_failed_requests(&mut self) -> Result<(), FetchError> {
    let retry_analytics = self.analytics.error().is_some();
    let retry_health = self.health.error().is_some();

    if !retry_analytics && !retry_health {
      tracing::warn!(device_id = %self.device_id, "retry requested with nothing in an error state");
      return Ok(());
    }

    self.is_refreshing = true;
    let result = if retry_analytics && retry_health {
      let (a, h) = join!(self.analytics.refresh(), self.health.refresh());
      if let Err(err) = h {
        tracing::warn!(device_id = %self.device_id, error = %err, "health retry failed");
      }
      a.map(|_| ())
    } else if retry_analytics {
      self.analytics.refresh().await.map(|_| ())
    } else {
      if let Err(err) = self.health.refresh().await {
        tracing::warn!(device_id = %self.device_id, error = %err, "health retry failed");
      }
      Ok(())
    };
    self.is_refreshing = false;

    match result {
      Ok(()) => {
        self.refresh_error = None;
        Ok(())
      }
      Err(err) => {
        self.refresh_error = Some(err.clone());
        Err(err)
      }
    }
  }

  fn compose(&self) -> (TelemetryViewModel, Vec<String>) {
    let fallback_packets = if self.analytics.data().is_none() && self.analytics.error().is_some() {
      Some(vec![transform::demo_packet(&self.device_id)])
    } else {
      None
    };

    let packets: Option<&[TelemetryPacket]> = self
      .analytics
      .data()
      .map(|v| v.as_slice())
      .or(fallback_packets.as_deref());

    transform::build_view_model(&self.device_id, packets, self.health.data(), &self.thresholds)
  }
}

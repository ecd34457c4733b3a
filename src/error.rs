//! Typed errors surfaced by the data layer.
//!
//! The transport is expected to reject with one of these categories; the
//! caching core passes them through unchanged. Transformation problems in the
//! composer layer are not `FetchError`s — they stay local to the composer.

use thiserror::Error;

/// A fetch rejection, categorized by the layer it originated in.
///
/// Errors are values here: they are cloned into every caller joined on a
/// deduplicated fetch and kept in resource state until the next success.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
  /// Malformed input to a fetch (bad device identifier, empty command).
  /// Never transient, never worth retrying.
  #[error("validation error: {message}")]
  Validation { message: String },

  /// Transport-level failure that survived the transport's own retries
  /// (timeout, connection refused, 5xx).
  #[error("network error: {message}")]
  Network { message: String },

  /// Well-formed response carrying a server-side failure (4xx, GraphQL error
  /// payload, truncated body). Retryability is per-instance.
  #[error("api error: {message}")]
  Api {
    message: String,
    status_code: Option<u16>,
    retryable: bool,
  },
}

impl FetchError {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation {
      message: message.into(),
    }
  }

  pub fn network(message: impl Into<String>) -> Self {
    Self::Network {
      message: message.into(),
    }
  }

  pub fn api(message: impl Into<String>, status_code: Option<u16>, retryable: bool) -> Self {
    Self::Api {
      message: message.into(),
      status_code,
      retryable,
    }
  }

  /// Whether a retry has any chance of succeeding.
  ///
  /// Network failures are transient by definition. Validation failures never
  /// are. Api failures carry their own hint (a 404 or auth failure says no,
  /// a truncated payload says yes).
  pub fn retryable(&self) -> bool {
    match self {
      Self::Validation { .. } => false,
      Self::Network { .. } => true,
      Self::Api { retryable, .. } => *retryable,
    }
  }

  /// HTTP status code, when the transport attached one.
  pub fn status_code(&self) -> Option<u16> {
    match self {
      Self::Api { status_code, .. } => *status_code,
      _ => None,
    }
  }

  /// Category name for logs and error summaries.
  pub fn category(&self) -> &'static str {
    match self {
      Self::Validation { .. } => "validation",
      Self::Network { .. } => "network",
      Self::Api { .. } => "api",
    }
  }
}

//! Deterministic cache keys for fetchable resources.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::FetchError;

/// Identity of one fetchable resource: an explicit tag registered by the
/// caller plus the canonical JSON serialization of the argument list.
///
/// The tag replaces function-identity naming — two fetches with equal
/// argument serializations never collide because the tag is part of the
/// hashed input and the visible key prefix. Argument serialization is
/// order-sensitive; structurally equal arguments serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  tag: &'static str,
  args_json: String,
}

impl QueryKey {
  /// Key for a resource taking arguments. Fails only when the arguments
  /// cannot be represented as JSON, which is a caller bug surfaced as a
  /// validation error.
  pub fn new<A: Serialize>(tag: &'static str, args: &A) -> Result<Self, FetchError> {
    let args = serde_json::to_value(args).map_err(|e| {
      FetchError::validation(format!("unserializable arguments for `{tag}`: {e}"))
    })?;
    Ok(Self::for_args(tag, args))
  }

  /// Key for a resource with a pre-built JSON argument list. Infallible;
  /// the usual constructor for domain key enums.
  pub fn for_args(tag: &'static str, args: serde_json::Value) -> Self {
    Self {
      tag,
      args_json: args.to_string(),
    }
  }

  /// Key for an argument-less resource.
  pub fn bare(tag: &'static str) -> Self {
    Self::for_args(tag, serde_json::Value::Array(Vec::new()))
  }

  pub fn tag(&self) -> &'static str {
    self.tag
  }

  /// Store key: the tag as a visible prefix (so pattern invalidation can
  /// target a resource family) plus a SHA-256 hash of the arguments for a
  /// stable, fixed-length remainder.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.args_json.as_bytes());
    format!("{}:{}", self.tag, hex::encode(hasher.finalize()))
  }

  /// Human-readable form for logs.
  pub fn description(&self) -> String {
    format!("{} {}", self.tag, self.args_json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identical_args_produce_identical_keys() {
    let a = QueryKey::new("device_analytics", &("dev-42", 7)).unwrap();
    let b = QueryKey::new("device_analytics", &("dev-42", 7)).unwrap();
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_different_args_produce_different_keys() {
    let a = QueryKey::new("device_analytics", &["dev-42"]).unwrap();
    let b = QueryKey::new("device_analytics", &["dev-43"]).unwrap();
    assert_ne!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_tag_disambiguates_equal_args() {
    let a = QueryKey::new("device_analytics", &["dev-42"]).unwrap();
    let b = QueryKey::new("device_health", &["dev-42"]).unwrap();
    assert_ne!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_argument_order_matters() {
    let a = QueryKey::new("fleet_window", &(1, 2)).unwrap();
    let b = QueryKey::new("fleet_window", &(2, 1)).unwrap();
    assert_ne!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_hash_is_tag_prefixed() {
    let key = QueryKey::bare("fleet_devices");
    assert!(key.cache_hash().starts_with("fleet_devices:"));
  }
}

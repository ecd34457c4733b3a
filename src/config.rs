use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Data-layer configuration: cache lifetimes and telemetry thresholds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub telemetry: TelemetryConfig,
}

/// Entry lifetimes, in seconds. Unset per-resource values fall back to
/// `default_ttl_secs`.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_ttl_secs")]
  pub default_ttl_secs: u64,
  pub analytics_ttl_secs: Option<u64>,
  pub health_ttl_secs: Option<u64>,
  pub fleet_ttl_secs: Option<u64>,
}

fn default_ttl_secs() -> u64 {
  300
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_secs: default_ttl_secs(),
      analytics_ttl_secs: None,
      health_ttl_secs: None,
      fleet_ttl_secs: None,
    }
  }
}

impl CacheConfig {
  pub fn default_ttl(&self) -> Duration {
    Duration::from_secs(self.default_ttl_secs)
  }

  pub fn analytics_ttl(&self) -> Duration {
    Duration::from_secs(self.analytics_ttl_secs.unwrap_or(self.default_ttl_secs))
  }

  pub fn health_ttl(&self) -> Duration {
    Duration::from_secs(self.health_ttl_secs.unwrap_or(self.default_ttl_secs))
  }

  pub fn fleet_ttl(&self) -> Duration {
    Duration::from_secs(self.fleet_ttl_secs.unwrap_or(self.default_ttl_secs))
  }
}

/// Thresholds the telemetry view model is derived against.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
  /// Raw temperature above this is flagged as high (°C).
  #[serde(default = "default_high_temp")]
  pub high_temp_c: f64,
  /// Battery at or below this is flagged as low (%).
  #[serde(default = "default_low_battery")]
  pub low_battery_pct: f64,
}

fn default_high_temp() -> f64 {
  50.0
}

fn default_low_battery() -> f64 {
  20.0
}

impl Default for TelemetryConfig {
  fn default() -> Self {
    Self {
      high_temp_c: default_high_temp(),
      low_battery_pct: default_low_battery(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./trackdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/trackdash/config.yaml
  ///
  /// With no file found anywhere, defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("trackdash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("trackdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

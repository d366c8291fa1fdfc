use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::SyncPolicy;

/// Company id of the internal tenant hidden from every listing.
pub const DEFAULT_EXCLUDED_COMPANY_ID: i64 = 95597;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub gripp: GrippConfig,
  /// Projects of this company never reach the dashboard
  #[serde(default = "default_excluded_company_id")]
  pub excluded_company_id: i64,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Override for the cache database location
  pub cache_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrippConfig {
  /// Base URL of the Gripp API, e.g. "https://api.gripp.com"
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Age after which serving the cache also triggers a background sync
  pub sync_after_secs: u64,
  /// Interval of the passive reload in `watch`
  pub refresh_interval_secs: u64,
  /// Page size of the blocking fetch on an empty cache
  pub page_size: u32,
  /// Page size of the background sync
  pub sync_page_size: u32,
}

impl Default for SyncConfig {
  fn default() -> Self {
    let policy = SyncPolicy::default();
    Self {
      sync_after_secs: policy.sync_after.as_secs(),
      refresh_interval_secs: policy.refresh_interval.as_secs(),
      page_size: policy.page_size,
      sync_page_size: policy.sync_page_size,
    }
  }
}

fn default_excluded_company_id() -> i64 {
  DEFAULT_EXCLUDED_COMPANY_ID
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./gripp-dash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/gripp-dash/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/gripp-dash/config.yaml\n\
                 with at least:\n\n  gripp:\n    url: https://api.gripp.com"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("gripp-dash.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("gripp-dash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Sync policy described by this configuration.
  ///
  /// The refresh interval and both page sizes must be non-zero.
  pub fn policy(&self) -> Result<SyncPolicy> {
    let sync = &self.sync;
    if sync.refresh_interval_secs == 0 {
      return Err(eyre!("sync.refresh_interval_secs must be greater than zero"));
    }
    if sync.page_size == 0 {
      return Err(eyre!("sync.page_size must be greater than zero"));
    }
    if sync.sync_page_size == 0 {
      return Err(eyre!("sync.sync_page_size must be greater than zero"));
    }

    Ok(SyncPolicy {
      sync_after: Duration::from_secs(sync.sync_after_secs),
      refresh_interval: Duration::from_secs(sync.refresh_interval_secs),
      page_size: sync.page_size,
      sync_page_size: sync.sync_page_size,
      excluded_company_id: self.excluded_company_id,
    })
  }

  /// Get the Gripp API token from environment variables.
  ///
  /// Checks GRIPP_DASH_TOKEN first, then GRIPP_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("GRIPP_DASH_TOKEN")
      .or_else(|_| std::env::var("GRIPP_API_TOKEN"))
      .map_err(|_| {
        eyre!("Gripp API token not found. Set GRIPP_DASH_TOKEN or GRIPP_API_TOKEN environment variable.")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("gripp:\n  url: https://api.gripp.com\n").unwrap();
    let policy = config.policy().unwrap();

    assert_eq!(config.excluded_company_id, DEFAULT_EXCLUDED_COMPANY_ID);
    assert_eq!(policy.sync_after, Duration::from_secs(5 * 60));
    assert_eq!(policy.refresh_interval, Duration::from_secs(15 * 60));
    assert_eq!(policy.page_size, 250);
    assert_eq!(policy.sync_page_size, 50);
    assert!(config.cache_path.is_none());
  }

  #[test]
  fn test_partial_sync_section() {
    let config = Config::parse(
      "gripp:\n  url: https://api.gripp.com\nexcluded_company_id: 1\nsync:\n  sync_after_secs: 60\n",
    )
    .unwrap();
    let policy = config.policy().unwrap();

    assert_eq!(policy.excluded_company_id, 1);
    assert_eq!(policy.sync_after, Duration::from_secs(60));
    assert_eq!(policy.sync_page_size, 50);
  }

  #[test]
  fn test_zero_interval_or_page_size_is_rejected() {
    for key in ["refresh_interval_secs", "page_size", "sync_page_size"] {
      let yaml = format!("gripp:\n  url: https://api.gripp.com\nsync:\n  {}: 0\n", key);
      let config = Config::parse(&yaml).unwrap();
      let err = config.policy().unwrap_err();
      assert!(err.to_string().contains(key), "{}: {}", key, err);
    }
  }

  #[test]
  fn test_zero_sync_after_always_revalidates() {
    let config =
      Config::parse("gripp:\n  url: https://api.gripp.com\nsync:\n  sync_after_secs: 0\n").unwrap();
    assert_eq!(config.policy().unwrap().sync_after, Duration::ZERO);
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "gripp:\n  url: https://example.test\ncache_path: /tmp/x.db\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.gripp.url, "https://example.test");
    assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/x.db")));
  }
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::query::QueryOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Project URL of the hosted backend (e.g., "https://xyz.supabase.co")
  pub url: String,
  /// Path of the REST interface under the project URL
  #[serde(default = "default_rest_path")]
  pub rest_path: String,
}

fn default_rest_path() -> String {
  "rest/v1".to_string()
}

/// Query cache tuning. Every field is optional in the file.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
  pub stale_time_ms: u64,
  pub cache_time_ms: u64,
  pub retry: u32,
  pub retry_delay_ms: u64,
  pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let options = QueryOptions::default();
    Self {
      stale_time_ms: options.stale_time.as_millis() as u64,
      cache_time_ms: options.cache_time.as_millis() as u64,
      retry: options.retry,
      retry_delay_ms: options.retry_delay.as_millis() as u64,
      sweep_interval_ms: 60_000,
    }
  }
}

impl CacheConfig {
  /// Default options for every query built from this configuration.
  pub fn query_options(&self) -> QueryOptions {
    QueryOptions::default()
      .with_stale_time(Duration::from_millis(self.stale_time_ms))
      .with_cache_time(Duration::from_millis(self.cache_time_ms))
      .with_retry(self.retry)
      .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_millis(self.sweep_interval_ms)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./vitrina.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/vitrina/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    match explicit_path {
      Some(path) if !path.exists() => Err(eyre!("Config file not found: {}", path.display())),
      Some(path) => Self::load_from_path(path),
      None => {
        let path = Self::candidate_paths()
          .into_iter()
          .find(|candidate| candidate.exists())
          .ok_or_else(|| {
            eyre!(
              "No configuration file found. Create ./vitrina.yaml or \
               ~/.config/vitrina/config.yaml with at least `backend.url`."
            )
          })?;
        Self::load_from_path(&path)
      }
    }
  }

  /// Locations searched when no explicit path is given, in priority order.
  fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("vitrina.yaml")];
    if let Some(config_dir) = dirs::config_dir() {
      paths.push(config_dir.join("vitrina").join("config.yaml"));
    }
    paths
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    if config.cache.stale_time_ms > config.cache.cache_time_ms {
      return Err(eyre!(
        "Invalid cache settings in {}: stale_time_ms ({}) exceeds cache_time_ms ({})",
        path.display(),
        config.cache.stale_time_ms,
        config.cache.cache_time_ms
      ));
    }

    Ok(config)
  }

  /// Get the backend API key from environment variables.
  ///
  /// Checks VITRINA_BACKEND_KEY first, then SUPABASE_ANON_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("VITRINA_BACKEND_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!(
          "Backend API key not found. Set VITRINA_BACKEND_KEY or SUPABASE_ANON_KEY environment variable."
        )
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, contents).expect("Failed to write config");
    (dir, path)
  }

  #[test]
  fn test_minimal_config_uses_defaults() {
    let (_dir, path) = write_config("backend:\n  url: https://shop.example.co\n");

    let config = Config::load(Some(&path)).expect("should load");

    assert_eq!(config.backend.url, "https://shop.example.co");
    assert_eq!(config.backend.rest_path, "rest/v1");
    assert_eq!(config.cache, CacheConfig::default());
    assert_eq!(config.cache.query_options(), QueryOptions::default());
    assert_eq!(config.cache.sweep_interval(), Duration::from_secs(60));
  }

  #[test]
  fn test_partial_cache_section() {
    let (_dir, path) = write_config(
      "backend:\n  url: https://shop.example.co\ncache:\n  stale_time_ms: 1000\n  retry: 2\n",
    );

    let config = Config::load(Some(&path)).expect("should load");
    let options = config.cache.query_options();

    assert_eq!(options.stale_time, Duration::from_millis(1000));
    assert_eq!(options.retry, 2);
    assert_eq!(options.cache_time, Duration::from_secs(600));
  }

  #[test]
  fn test_stale_longer_than_cache_time_is_rejected() {
    let (_dir, path) = write_config(
      "backend:\n  url: https://shop.example.co\ncache:\n  stale_time_ms: 9000\n  cache_time_ms: 1000\n",
    );

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("stale_time_ms"));
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/vitrina.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_local_file_is_searched_first() {
    let paths = Config::candidate_paths();
    assert_eq!(paths[0], PathBuf::from("vitrina.yaml"));
    assert!(paths
      .iter()
      .skip(1)
      .all(|p| p.ends_with("vitrina/config.yaml")));
  }

  #[test]
  fn test_missing_backend_is_parse_error() {
    let (_dir, path) = write_config("cache:\n  retry: 1\n");

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
  }
}

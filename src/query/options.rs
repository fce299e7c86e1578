use std::time::Duration;

/// Per-consumer query configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
  /// When false no fetch is attempted and no data is returned
  pub enabled: bool,
  /// How long a cached entry counts as fresh
  pub stale_time: Duration,
  /// How long a cached entry survives before it is purged
  pub cache_time: Duration,
  /// Retry attempts after the first failure
  pub retry: u32,
  /// Fixed pause between attempts
  pub retry_delay: Duration,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      enabled: true,
      stale_time: Duration::from_secs(5 * 60),
      cache_time: Duration::from_secs(10 * 60),
      retry: 3,
      retry_delay: Duration::from_millis(1000),
    }
  }
}

impl QueryOptions {
  pub fn with_enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
    self.cache_time = cache_time;
    self
  }

  pub fn with_retry(mut self, retry: u32) -> Self {
    self.retry = retry;
    self
  }

  pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
    self.retry_delay = retry_delay;
    self
  }
}

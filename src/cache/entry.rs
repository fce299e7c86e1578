//! A single cached query result and its freshness bookkeeping.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Type-erased payload shared between the cache and every consumer reading it.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// One cached query result.
#[derive(Clone)]
pub struct CacheEntry {
  pub value: Payload,
  /// When the last successful fetch completed
  pub fetched_at: Instant,
  /// Freshness window supplied by the writer
  pub stale_after: Duration,
  /// Age after which the entry is purged
  pub expire_after: Duration,
}

impl CacheEntry {
  pub fn new(value: Payload, stale_after: Duration, expire_after: Duration) -> Self {
    Self {
      value,
      fetched_at: Instant::now(),
      stale_after,
      expire_after,
    }
  }

  pub fn age(&self, now: Instant) -> Duration {
    now.saturating_duration_since(self.fetched_at)
  }

  pub fn is_fresh(&self, now: Instant) -> bool {
    self.age(now) < self.stale_after
  }

  pub fn is_expired(&self, now: Instant) -> bool {
    self.age(now) > self.expire_after
  }

  /// Downcast the payload, returning `None` if it holds a different type.
  pub fn value_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
    Arc::clone(&self.value).downcast::<T>().ok()
  }
}

impl std::fmt::Debug for CacheEntry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CacheEntry")
      .field("fetched_at", &self.fetched_at)
      .field("stale_after", &self.stale_after)
      .field("expire_after", &self.expire_after)
      .finish_non_exhaustive()
  }
}

/// A typed view of a cache hit.
#[derive(Debug)]
pub struct CachedValue<T> {
  pub value: Arc<T>,
  pub fetched_at: Instant,
  pub is_stale: bool,
}

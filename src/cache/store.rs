//! Shared in-memory query cache and its background eviction sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::entry::{CacheEntry, CachedValue};

/// Process-wide query cache.
///
/// Construct one at application start and hand clones to every consumer;
/// all clones share the same entries. Each mutation is a single critical
/// section, so a sweep never observes a half-applied write.
#[derive(Clone, Default)]
pub struct QueryCache {
  entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl QueryCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    // Entries are plain snapshots, so a panic mid-write cannot leave one torn.
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Look up `key` as a `T`.
  ///
  /// Entries past their expiry are dropped on the spot rather than waiting
  /// for the next sweep. A stored value of another type is reported as a miss.
  pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<CachedValue<T>> {
    let now = Instant::now();
    let mut entries = self.entries();

    let entry = entries.get(key)?;
    if entry.is_expired(now) {
      debug!(key, "cache entry expired on read");
      entries.remove(key);
      return None;
    }

    let Some(value) = entry.value_as::<T>() else {
      debug!(key, "cache entry holds a different type, treating as miss");
      return None;
    };

    Some(CachedValue {
      value,
      fetched_at: entry.fetched_at,
      is_stale: !entry.is_fresh(now),
    })
  }

  /// Store a freshly fetched value, replacing any previous entry for `key`.
  pub fn insert<T: Send + Sync + 'static>(
    &self,
    key: &str,
    value: Arc<T>,
    stale_after: Duration,
    expire_after: Duration,
  ) {
    let entry = CacheEntry::new(value, stale_after, expire_after);
    self.entries().insert(key.to_string(), entry);
  }

  /// Evict one key, or everything when `key` is `None`.
  pub fn clear(&self, key: Option<&str>) {
    let mut entries = self.entries();
    match key {
      Some(key) => {
        if entries.remove(key).is_some() {
          debug!(key, "evicted cache entry");
        }
      }
      None => {
        let count = entries.len();
        entries.clear();
        debug!(count, "cleared query cache");
      }
    }
  }

  /// Remove every entry older than its own expiry. Returns how many went.
  pub fn sweep(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries().contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries().is_empty()
  }

  /// Spawn the recurring eviction sweep.
  ///
  /// The sweep runs until the returned handle is shut down or dropped.
  pub fn start_sweeper(&self, every: Duration) -> Sweeper {
    // tokio intervals reject a zero period
    let every = every.max(Duration::from_millis(1));
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let cache = self.clone();

    let handle = tokio::spawn(async move {
      // First tick one full period out, not immediately
      let mut interval = tokio::time::interval_at(Instant::now() + every, every);
      interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        tokio::select! {
          _ = token.cancelled() => break,
          _ = interval.tick() => {
            let removed = cache.sweep();
            if removed > 0 {
              debug!(removed, remaining = cache.len(), "swept expired cache entries");
            }
          }
        }
      }
    });

    info!(interval_ms = every.as_millis() as u64, "cache sweeper started");
    Sweeper { cancel, handle: Some(handle) }
  }
}

impl std::fmt::Debug for QueryCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryCache")
      .field("len", &self.len())
      .finish()
  }
}

/// Handle to the background sweep task.
pub struct Sweeper {
  cancel: CancellationToken,
  handle: Option<JoinHandle<()>>,
}

impl Sweeper {
  /// Stop the sweep and wait for the task to exit.
  pub async fn shutdown(mut self) {
    self.cancel.cancel();
    if let Some(handle) = self.handle.take() {
      let _ = handle.await;
    }
    info!("cache sweeper stopped");
  }

  pub fn is_running(&self) -> bool {
    self
      .handle
      .as_ref()
      .is_some_and(|handle| !handle.is_finished())
  }
}

impl Drop for Sweeper {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}

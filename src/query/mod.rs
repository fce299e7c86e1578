//! Async query abstraction for data fetching with caching support.
//!
//! Inspired by TanStack Query, this module provides a `Query<T>` type that
//! binds a cache key to a fetch function and exposes the result as a
//! stale-while-revalidate snapshot: data, loading flag, error and staleness.
//!
//! # Example
//!
//! ```ignore
//! let catalog = catalog_client.clone();
//! let query = Query::new(cache.clone(), "products:all", move |cancel| {
//!     let catalog = catalog.clone();
//!     async move { catalog.list_products(None, cancel).await }
//! });
//!
//! // Serve from cache or start fetching
//! query.fetch();
//!
//! // Render whatever is available right now
//! let snapshot = query.snapshot();
//!
//! // Or wait for the next state change
//! let mut updates = query.subscribe();
//! updates.changed().await?;
//! ```

mod options;
mod state;

pub use options::QueryOptions;
pub use state::{QuerySnapshot, QueryStatus};

use futures::future::{BoxFuture, FutureExt};
use std::fmt::Display;
use std::future::{Future, IntoFuture};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::QueryCache;

/// A factory that creates a fresh fetch future for every attempt
type FetcherFn<T> =
  dyn Fn(CancellationToken) -> BoxFuture<'static, Result<T, String>> + Send + Sync;

/// The consumer's single in-flight slot.
#[derive(Default)]
struct InFlight {
  /// Bumped on every start and on teardown; only the newest may settle
  seq: u64,
  token: Option<CancellationToken>,
}

/// State shared between a `Query` and the task running its fetch.
struct Shared<T> {
  inflight: Mutex<InFlight>,
  state: watch::Sender<QuerySnapshot<T>>,
}

impl<T> Shared<T> {
  fn lock(&self) -> MutexGuard<'_, InFlight> {
    self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn cancel_locked(inflight: &mut InFlight) {
    inflight.seq += 1;
    if let Some(token) = inflight.token.take() {
      token.cancel();
    }
  }

  /// Supersede whatever is in flight and claim the slot for a new fetch.
  fn begin(&self, update: impl FnOnce(&mut QuerySnapshot<T>)) -> (u64, CancellationToken) {
    let mut inflight = self.lock();
    Self::cancel_locked(&mut inflight);
    let token = CancellationToken::new();
    inflight.token = Some(token.clone());
    self.state.send_modify(update);
    (inflight.seq, token)
  }

  /// Supersede whatever is in flight without starting anything new.
  fn supersede(&self, update: impl FnOnce(&mut QuerySnapshot<T>)) {
    let mut inflight = self.lock();
    Self::cancel_locked(&mut inflight);
    self.state.send_modify(update);
  }

  fn teardown(&self) {
    Self::cancel_locked(&mut self.lock());
  }

  /// Apply a completed fetch if it is still the newest one.
  fn settle(&self, seq: u64, apply: impl FnOnce(&mut QuerySnapshot<T>)) -> bool {
    let mut inflight = self.lock();
    if inflight.seq != seq {
      return false;
    }
    inflight.token = None;
    self.state.send_modify(apply);
    true
  }

  fn is_fetching(&self) -> bool {
    self.lock().token.is_some()
  }
}

/// A cached, retrying, cancellable query bound to one key.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure that receives a cancellation token)
/// - Loading/success/error states, published through a watch channel
/// - Stale-while-revalidate reads against a shared `QueryCache`
/// - A single in-flight fetch; starting another supersedes it
///
/// Dropping the query cancels its in-flight fetch and no further state
/// updates are published.
pub struct Query<T> {
  key: String,
  options: QueryOptions,
  cache: QueryCache,
  fetcher: Arc<FetcherFn<T>>,
  shared: Arc<Shared<T>>,
}

impl<T: Send + Sync + 'static> Query<T> {
  /// Create a new query for `key` backed by `fetcher`.
  ///
  /// The fetcher is called once per attempt. It receives a token that is
  /// cancelled when the attempt is superseded; honoring it is optional since
  /// superseded results are discarded either way.
  pub fn new<F, Fut, E>(cache: QueryCache, key: impl Into<String>, fetcher: F) -> Self
  where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display + 'static,
  {
    let (state, _) = watch::channel(QuerySnapshot::default());
    Self {
      key: key.into(),
      options: QueryOptions::default(),
      cache,
      fetcher: boxed_fetcher(fetcher),
      shared: Arc::new(Shared {
        inflight: Mutex::new(InFlight::default()),
        state,
      }),
    }
  }

  pub fn with_options(mut self, options: QueryOptions) -> Self {
    self.options = options;
    self
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn options(&self) -> &QueryOptions {
    &self.options
  }

  /// Current state of the query.
  pub fn snapshot(&self) -> QuerySnapshot<T> {
    self.shared.state.borrow().clone()
  }

  /// Receive a new snapshot after every state change.
  pub fn subscribe(&self) -> watch::Receiver<QuerySnapshot<T>> {
    self.shared.state.subscribe()
  }

  pub fn data(&self) -> Option<Arc<T>> {
    self.shared.state.borrow().data.clone()
  }

  pub fn error(&self) -> Option<String> {
    self.shared.state.borrow().error.clone()
  }

  pub fn is_loading(&self) -> bool {
    self.shared.state.borrow().loading
  }

  pub fn is_stale(&self) -> bool {
    self.shared.state.borrow().is_stale
  }

  /// Whether a fetch is currently in flight for this consumer.
  pub fn is_fetching(&self) -> bool {
    self.shared.is_fetching()
  }

  /// Wait until no fetch is pending and return the resulting snapshot.
  pub async fn settled(&self) -> QuerySnapshot<T> {
    let mut updates = self.subscribe();
    let settled = updates
      .wait_for(|snapshot| !snapshot.loading)
      .await
      .map(|snapshot| QuerySnapshot::clone(&snapshot));
    settled.unwrap_or_else(|_| self.snapshot())
  }

  /// Serve from cache and fetch if needed.
  ///
  /// A fresh entry is returned without touching the network, a stale one is
  /// returned flagged while a background fetch refreshes it, and a missing
  /// one starts a fetch. No-op while a fetch is already in flight.
  pub fn fetch(&self) {
    if !self.options.enabled {
      self.disable();
      return;
    }
    if self.shared.is_fetching() {
      return;
    }
    self.load();
  }

  /// Force a new fetch regardless of cache freshness.
  ///
  /// Any in-flight fetch is superseded. The returned handle resolves once
  /// this fetch settles or is itself superseded.
  pub fn refetch(&self) -> FetchHandle {
    if !self.options.enabled {
      return FetchHandle::done();
    }
    debug!(key = %self.key, "forced refetch");
    let (seq, token) = self.shared.begin(|snapshot| {
      snapshot.loading = true;
      snapshot.status = QueryStatus::Loading;
    });
    self.spawn(seq, token)
  }

  /// Point the query at a different key and fetcher, then reload.
  pub fn rebind<F, Fut, E>(&mut self, key: impl Into<String>, fetcher: F)
  where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display + 'static,
  {
    self.key = key.into();
    self.fetcher = boxed_fetcher(fetcher);
    self.activate();
  }

  /// Enable or disable the query, reloading when the flag changes.
  pub fn set_enabled(&mut self, enabled: bool) {
    if self.options.enabled == enabled {
      return;
    }
    self.options.enabled = enabled;
    self.activate();
  }

  fn activate(&self) {
    if self.options.enabled {
      self.load();
    } else {
      self.disable();
    }
  }

  fn disable(&self) {
    self
      .shared
      .supersede(|snapshot| *snapshot = QuerySnapshot::default());
  }

  fn load(&self) {
    match self.cache.get::<T>(&self.key) {
      Some(hit) if !hit.is_stale => {
        debug!(key = %self.key, "cache hit");
        self.shared.supersede(|snapshot| {
          *snapshot = QuerySnapshot {
            data: Some(hit.value),
            loading: false,
            error: None,
            is_stale: false,
            status: QueryStatus::Success,
          }
        });
      }
      Some(hit) => {
        debug!(key = %self.key, "serving stale entry while revalidating");
        let (seq, token) = self.shared.begin(|snapshot| {
          *snapshot = QuerySnapshot {
            data: Some(hit.value),
            loading: true,
            error: None,
            is_stale: true,
            status: QueryStatus::Loading,
          }
        });
        self.spawn(seq, token);
      }
      None => {
        debug!(key = %self.key, "cache miss");
        let (seq, token) = self.shared.begin(|snapshot| {
          *snapshot = QuerySnapshot {
            loading: true,
            status: QueryStatus::Loading,
            ..QuerySnapshot::default()
          }
        });
        self.spawn(seq, token);
      }
    }
  }

  fn spawn(&self, seq: u64, token: CancellationToken) -> FetchHandle {
    let job = FetchJob {
      key: self.key.clone(),
      options: self.options,
      cache: self.cache.clone(),
      fetcher: Arc::clone(&self.fetcher),
      shared: Arc::clone(&self.shared),
      seq,
      token,
    };
    FetchHandle {
      handle: Some(tokio::spawn(job.run())),
    }
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    self.shared.teardown();
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("options", &self.options)
      .field("state", &*self.shared.state.borrow())
      .finish_non_exhaustive()
  }
}

fn boxed_fetcher<T, F, Fut, E>(fetcher: F) -> Arc<FetcherFn<T>>
where
  T: Send + 'static,
  F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, E>> + Send + 'static,
  E: Display + 'static,
{
  Arc::new(move |token| {
    let fut = fetcher(token);
    async move { fut.await.map_err(|e| e.to_string()) }.boxed()
  })
}

/// Everything a spawned fetch needs, detached from the `Query` borrow.
struct FetchJob<T> {
  key: String,
  options: QueryOptions,
  cache: QueryCache,
  fetcher: Arc<FetcherFn<T>>,
  shared: Arc<Shared<T>>,
  seq: u64,
  token: CancellationToken,
}

impl<T: Send + Sync + 'static> FetchJob<T> {
  async fn run(self) {
    let mut failures = 0u32;

    loop {
      let result = tokio::select! {
        biased;
        _ = self.token.cancelled() => {
          debug!(key = %self.key, seq = self.seq, "fetch cancelled");
          return;
        }
        result = (self.fetcher)(self.token.clone()) => result,
      };

      let message = match result {
        Ok(value) => {
          self.succeed(value);
          return;
        }
        Err(message) => message,
      };

      failures += 1;
      if failures > self.options.retry {
        warn!(key = %self.key, attempts = failures, error = %message, "fetch failed, giving up");
        self.fail(message);
        return;
      }

      warn!(
        key = %self.key,
        attempt = failures,
        retry = self.options.retry,
        error = %message,
        "fetch failed, retrying"
      );
      tokio::select! {
        biased;
        _ = self.token.cancelled() => return,
        _ = tokio::time::sleep(self.options.retry_delay) => {}
      }
    }
  }

  fn succeed(&self, value: T) {
    let value = Arc::new(value);
    let applied = self.shared.settle(self.seq, |snapshot| {
      self.cache.insert(
        &self.key,
        Arc::clone(&value),
        self.options.stale_time,
        self.options.cache_time,
      );
      *snapshot = QuerySnapshot {
        data: Some(value),
        loading: false,
        error: None,
        is_stale: false,
        status: QueryStatus::Success,
      };
    });

    if applied {
      debug!(key = %self.key, "fetch succeeded");
    } else {
      debug!(key = %self.key, seq = self.seq, "discarding superseded result");
    }
  }

  fn fail(&self, message: String) {
    // Data from the last success stays visible
    self.shared.settle(self.seq, |snapshot| {
      snapshot.error = Some(message);
      snapshot.loading = false;
      snapshot.status = QueryStatus::Error;
    });
  }
}

/// Completion handle returned by [`Query::refetch`].
///
/// Await it to wait for the fetch to settle. Dropping it does not cancel
/// the fetch.
pub struct FetchHandle {
  handle: Option<JoinHandle<()>>,
}

impl FetchHandle {
  fn done() -> Self {
    Self { handle: None }
  }

  pub fn is_finished(&self) -> bool {
    self
      .handle
      .as_ref()
      .map(|handle| handle.is_finished())
      .unwrap_or(true)
  }
}

impl IntoFuture for FetchHandle {
  type Output = ();
  type IntoFuture = BoxFuture<'static, ()>;

  fn into_future(self) -> Self::IntoFuture {
    async move {
      if let Some(handle) = self.handle {
        // The job never panics; a JoinError only means the runtime shut down
        let _ = handle.await;
      }
    }
    .boxed()
  }
}

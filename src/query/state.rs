use std::sync::Arc;

/// Where a consumer sits in its fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
  /// Nothing requested yet, or the query is disabled
  #[default]
  Idle,
  /// A fetch is in flight (possibly a background refresh over stale data)
  Loading,
  /// Last fetch cycle succeeded
  Success,
  /// Last fetch cycle exhausted its retries
  Error,
}

/// Point-in-time view of a query, as seen by the UI layer.
///
/// `data` and `error` survive across refreshes: a background refetch keeps
/// the previous data visible with `is_stale` set, and a failure leaves the
/// last good data in place.
#[derive(Debug)]
pub struct QuerySnapshot<T> {
  pub data: Option<Arc<T>>,
  pub loading: bool,
  pub error: Option<String>,
  pub is_stale: bool,
  pub status: QueryStatus,
}

impl<T> QuerySnapshot<T> {
  pub fn data(&self) -> Option<&T> {
    self.data.as_deref()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }
}

impl<T> Default for QuerySnapshot<T> {
  fn default() -> Self {
    Self {
      data: None,
      loading: false,
      error: None,
      is_stale: false,
      status: QueryStatus::Idle,
    }
  }
}

// Manual impl: cloning only bumps the Arc, so T itself need not be Clone.
impl<T> Clone for QuerySnapshot<T> {
  fn clone(&self) -> Self {
    Self {
      data: self.data.clone(),
      loading: self.loading,
      error: self.error.clone(),
      is_stale: self.is_stale,
      status: self.status,
    }
  }
}

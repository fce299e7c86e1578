/// Structured identifier for a cached query.
///
/// Implementors map their variants onto a stable opaque string so that
/// equivalent requests land on the same cache entry.
pub trait QueryKey {
  /// Stable cache key (e.g., a hex digest of the normalized request)
  fn cache_key(&self) -> String;

  /// Human-readable description for logs
  fn description(&self) -> String;
}

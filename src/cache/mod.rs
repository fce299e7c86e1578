//! Key-addressed, in-memory cache shared by every query consumer.
//!
//! This module provides:
//! - Type-erased entries with per-entry freshness and expiry windows
//! - Explicit eviction of one key or the whole cache
//! - A cancellable background sweep that purges expired entries
//! - The `QueryKey` trait for hashing structured requests into cache keys

mod entry;
mod key;
mod store;

pub use entry::CachedValue;
pub use key::QueryKey;
pub use store::{QueryCache, Sweeper};

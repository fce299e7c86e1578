//! Stale-while-revalidate query cache for the storefront backend.
//!
//! `QueryCache` is the shared cache service and `Query<T>` is one consumer
//! bound to a key and a fetch function. The `catalog` module wires both to
//! the storefront's product and category tables.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod query;

pub use cache::{QueryCache, QueryKey, Sweeper};
pub use query::{FetchHandle, Query, QueryOptions, QuerySnapshot, QueryStatus};

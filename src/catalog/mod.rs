//! Storefront catalog access: backend client, cache keys and cached reads.

mod cached;
mod client;
mod keys;
mod types;

pub use cached::CachedCatalog;
pub use client::CatalogClient;
pub use keys::StoreQueryKey;
pub use types::{format_mdl, Category, Product};

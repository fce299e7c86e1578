//! Catalog reads routed through the shared query cache.

use color_eyre::Result;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{QueryCache, QueryKey};
use crate::query::{Query, QueryOptions};

use super::client::CatalogClient;
use super::keys::StoreQueryKey;
use super::types::{Category, Product};

/// Catalog client with transparent stale-while-revalidate caching.
///
/// Each method hands back an unstarted `Query`; call `fetch()` on it to
/// serve from cache or hit the backend. All queries share one cache, so
/// two pages asking for the same listing reuse each other's results.
#[derive(Clone)]
pub struct CachedCatalog {
  inner: CatalogClient,
  cache: QueryCache,
  options: QueryOptions,
}

impl CachedCatalog {
  pub fn new(inner: CatalogClient, cache: QueryCache, options: QueryOptions) -> Self {
    Self {
      inner,
      cache,
      options,
    }
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  pub fn products(&self, category: Option<&str>) -> Query<Vec<Product>> {
    let key = StoreQueryKey::Products {
      category: category.map(String::from),
    };
    let inner = self.inner.clone();
    let category = category.map(String::from);

    self.query(&key, move |cancel| {
      let inner = inner.clone();
      let category = category.clone();
      async move { inner.list_products(category.as_deref(), cancel).await }
    })
  }

  pub fn product(&self, id: i64) -> Query<Product> {
    let inner = self.inner.clone();
    self.query(&StoreQueryKey::Product { id }, move |cancel| {
      let inner = inner.clone();
      async move { inner.get_product(id, cancel).await }
    })
  }

  pub fn categories(&self) -> Query<Vec<Category>> {
    let inner = self.inner.clone();
    self.query(&StoreQueryKey::Categories, move |cancel| {
      let inner = inner.clone();
      async move { inner.list_categories(cancel).await }
    })
  }

  pub fn featured(&self, limit: u32) -> Query<Vec<Product>> {
    let inner = self.inner.clone();
    self.query(&StoreQueryKey::Featured { limit }, move |cancel| {
      let inner = inner.clone();
      async move { inner.featured_products(limit, cancel).await }
    })
  }

  /// Drop the cached result for one storefront read.
  pub fn invalidate(&self, key: &StoreQueryKey) {
    debug!(query = %key.description(), "invalidating");
    self.cache.clear(Some(&key.cache_key()));
  }

  fn query<T, F, Fut>(&self, key: &StoreQueryKey, fetcher: F) -> Query<T>
  where
    T: Send + Sync + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    debug!(query = %key.description(), "building query");
    Query::new(self.cache.clone(), key.cache_key(), fetcher).with_options(self.options)
  }
}

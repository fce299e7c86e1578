use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::Config;

use super::types::{Category, Product};

/// Read-only client for the storefront tables.
///
/// Every call races its cancellation token, so a superseded query stops
/// waiting on the network as soon as it is cancelled.
#[derive(Clone)]
pub struct CatalogClient {
  http: reqwest::Client,
  base: Url,
  api_key: String,
}

impl CatalogClient {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    Self::with_base(&config.backend.url, &config.backend.rest_path, api_key)
  }

  /// Build a client against an explicit backend URL and key.
  pub fn with_base(url: &str, rest_path: &str, api_key: impl Into<String>) -> Result<Self> {
    let root = Url::parse(url).map_err(|e| eyre!("Invalid backend URL {}: {}", url, e))?;
    let rest_path = format!("{}/", rest_path.trim_matches('/'));
    let base = root
      .join(&rest_path)
      .map_err(|e| eyre!("Invalid REST path {}: {}", rest_path, e))?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("vitrina/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      api_key: api_key.into(),
    })
  }

  /// List products, newest first, optionally within one category.
  pub async fn list_products(
    &self,
    category: Option<&str>,
    cancel: CancellationToken,
  ) -> Result<Vec<Product>> {
    self
      .select("products", &products_filter(category), &cancel)
      .await
  }

  /// Get a single product by id
  pub async fn get_product(&self, id: i64, cancel: CancellationToken) -> Result<Product> {
    let filter = [("id", format!("eq.{}", id)), ("limit", "1".to_string())];
    let rows: Vec<Product> = self.select("products", &filter, &cancel).await?;

    rows
      .into_iter()
      .next()
      .ok_or_else(|| eyre!("Product {} not found", id))
  }

  /// List categories in navigation order
  pub async fn list_categories(&self, cancel: CancellationToken) -> Result<Vec<Category>> {
    let filter = [("order", "position.asc".to_string())];
    self.select("categories", &filter, &cancel).await
  }

  /// Featured products for the landing page
  pub async fn featured_products(
    &self,
    limit: u32,
    cancel: CancellationToken,
  ) -> Result<Vec<Product>> {
    let filter = [
      ("is_featured", "is.true".to_string()),
      ("order", "created_at.desc".to_string()),
      ("limit", limit.to_string()),
    ];
    self.select("products", &filter, &cancel).await
  }

  fn endpoint(&self, table: &str) -> Result<Url> {
    self
      .base
      .join(table)
      .map_err(|e| eyre!("Invalid table name {}: {}", table, e))
  }

  async fn select<R: DeserializeOwned>(
    &self,
    table: &str,
    filter: &[(&str, String)],
    cancel: &CancellationToken,
  ) -> Result<R> {
    let url = self.endpoint(table)?;
    debug!(%url, ?filter, "backend select");

    let request = self
      .http
      .get(url)
      .query(&[("select", "*")])
      .query(filter)
      .header("apikey", &self.api_key)
      .bearer_auth(&self.api_key);

    let send = async {
      let response = request
        .send()
        .await
        .map_err(|e| eyre!("Request to {} failed: {}", table, e))?
        .error_for_status()
        .map_err(|e| eyre!("Backend rejected {} query: {}", table, e))?;

      response
        .json::<R>()
        .await
        .map_err(|e| eyre!("Failed to parse {} rows: {}", table, e))
    };

    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(eyre!("Request to {} was cancelled", table)),
      result = send => result,
    }
  }
}

fn products_filter(category: Option<&str>) -> Vec<(&'static str, String)> {
  let mut filter = vec![("order", "created_at.desc".to_string())];
  if let Some(slug) = category {
    filter.push(("category_slug", format!("eq.{}", slug.trim().to_lowercase())));
  }
  filter
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> CatalogClient {
    CatalogClient::with_base("https://shop.example.co", "/rest/v1/", "anon-key")
      .expect("should build client")
  }

  #[test]
  fn test_endpoint_joins_rest_path() {
    let url = client().endpoint("products").unwrap();
    assert_eq!(url.as_str(), "https://shop.example.co/rest/v1/products");
  }

  #[test]
  fn test_invalid_base_url() {
    let result = CatalogClient::with_base("not a url", "rest/v1", "key");
    assert!(result.is_err());
  }

  #[test]
  fn test_products_filter() {
    assert_eq!(
      products_filter(None),
      vec![("order", "created_at.desc".to_string())]
    );
    assert_eq!(
      products_filter(Some(" Sensors ")),
      vec![
        ("order", "created_at.desc".to_string()),
        ("category_slug", "eq.sensors".to_string()),
      ]
    );
  }

  #[tokio::test]
  async fn test_cancelled_token_short_circuits() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client().list_categories(cancel).await.unwrap_err();
    assert!(err.to_string().contains("cancelled"));
  }
}

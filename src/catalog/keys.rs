//! Cache keys for storefront reads.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

/// Query key types for catalog reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreQueryKey {
  /// Product list, optionally narrowed to one category
  Products { category: Option<String> },
  /// A single product by id
  Product { id: i64 },
  /// Category navigation tree
  Categories,
  /// Featured products on the landing page
  Featured { limit: u32 },
}

impl QueryKey for StoreQueryKey {
  fn cache_key(&self) -> String {
    let input = match self {
      Self::Products { category } => format!(
        "products:{}",
        category.as_deref().map(normalize_slug).unwrap_or_default()
      ),
      Self::Product { id } => format!("product:{}", id),
      Self::Categories => "categories".to_string(),
      Self::Featured { limit } => format!("featured:{}", limit),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::Products { category } => match category {
        Some(c) => format!("products in {}", c),
        None => "all products".to_string(),
      },
      Self::Product { id } => format!("product {}", id),
      Self::Categories => "categories".to_string(),
      Self::Featured { limit } => format!("top {} featured products", limit),
    }
  }
}

/// Normalize a category slug for consistent hashing.
fn normalize_slug(slug: &str) -> String {
  slug.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn products(category: Option<&str>) -> StoreQueryKey {
    StoreQueryKey::Products {
      category: category.map(String::from),
    }
  }

  #[test]
  fn test_cache_key_is_stable_hex() {
    let key = StoreQueryKey::Categories.cache_key();
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(key, StoreQueryKey::Categories.cache_key());
  }

  #[test]
  fn test_slug_case_and_whitespace_ignored() {
    assert_eq!(
      products(Some("  Smart-Lighting ")).cache_key(),
      products(Some("smart-lighting")).cache_key()
    );
  }

  #[test]
  fn test_distinct_queries_do_not_collide() {
    let keys = [
      products(None).cache_key(),
      products(Some("sensors")).cache_key(),
      StoreQueryKey::Product { id: 7 }.cache_key(),
      StoreQueryKey::Featured { limit: 7 }.cache_key(),
      StoreQueryKey::Categories.cache_key(),
    ];
    for (i, a) in keys.iter().enumerate() {
      for b in &keys[i + 1..] {
        assert_ne!(a, b);
      }
    }
  }

  #[test]
  fn test_description() {
    assert_eq!(products(None).description(), "all products");
    assert_eq!(products(Some("locks")).description(), "products in locks");
    assert_eq!(StoreQueryKey::Product { id: 3 }.description(), "product 3");
  }
}

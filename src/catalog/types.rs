//! Storefront rows as returned by the backend's REST interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product listing. Prices are stored in bani (1/100 MDL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: i64,
  pub name: String,
  pub slug: String,
  #[serde(default)]
  pub description: Option<String>,
  pub price: i64,
  /// Pre-discount price, shown struck through when higher than `price`
  #[serde(default)]
  pub compare_at_price: Option<i64>,
  #[serde(default)]
  pub category_slug: Option<String>,
  #[serde(default)]
  pub stock: i32,
  #[serde(default)]
  pub is_featured: bool,
  #[serde(default)]
  pub images: Vec<String>,
  pub created_at: DateTime<Utc>,
}

impl Product {
  pub fn price_mdl(&self) -> String {
    format_mdl(self.price)
  }

  pub fn in_stock(&self) -> bool {
    self.stock > 0
  }

  /// Whole-percent discount against `compare_at_price`, if any.
  pub fn discount_percent(&self) -> Option<u8> {
    let was = self.compare_at_price.filter(|&was| was > self.price && was > 0)?;
    Some((((was - self.price) * 100) / was) as u8)
  }
}

/// Product category, ordered by `position` in navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  pub id: i64,
  pub name: String,
  pub slug: String,
  #[serde(default)]
  pub parent_id: Option<i64>,
  #[serde(default)]
  pub position: i32,
}

/// Format a bani amount as "1299.00 MDL".
pub fn format_mdl(bani: i64) -> String {
  let sign = if bani < 0 { "-" } else { "" };
  let abs = bani.unsigned_abs();
  format!("{}{}.{:02} MDL", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn product(price: i64, compare_at_price: Option<i64>) -> Product {
    Product {
      id: 1,
      name: "Smart Plug".to_string(),
      slug: "smart-plug".to_string(),
      description: None,
      price,
      compare_at_price,
      category_slug: Some("plugs".to_string()),
      stock: 0,
      is_featured: false,
      images: Vec::new(),
      created_at: Utc::now(),
    }
  }

  #[test]
  fn test_format_mdl() {
    assert_eq!(format_mdl(129_900), "1299.00 MDL");
    assert_eq!(format_mdl(5), "0.05 MDL");
    assert_eq!(format_mdl(-250), "-2.50 MDL");
  }

  #[test]
  fn test_discount_percent() {
    assert_eq!(product(7_500, Some(10_000)).discount_percent(), Some(25));
    assert_eq!(product(10_000, Some(10_000)).discount_percent(), None);
    assert_eq!(product(10_000, None).discount_percent(), None);
  }

  #[test]
  fn test_deserialize_backend_row_with_missing_optionals() {
    let row = r#"{
      "id": 42,
      "name": "Zigbee Hub",
      "slug": "zigbee-hub",
      "price": 189900,
      "created_at": "2024-03-01T10:00:00+00:00"
    }"#;

    let product: Product = serde_json::from_str(row).expect("should parse");
    assert_eq!(product.id, 42);
    assert_eq!(product.price_mdl(), "1899.00 MDL");
    assert!(!product.in_stock());
    assert!(product.images.is_empty());
    assert!(product.category_slug.is_none());
  }
}

//! Catalog product model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Sku;

/// Fields extracted from one product page.
///
/// Everything except the SKU is optional: pages of out-of-stock or minimal
/// products routinely omit data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: Sku,
    pub url: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    /// Tri-state: `None` when the page does not say.
    pub availability: Option<bool>,
}

/// A catalog product as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku: Sku,
    pub url: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub availability: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` while the SKU is present in the published sitemap.
    pub delisted_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Build the stored form of a first-time record.
    pub fn from_record(record: &ProductRecord, now: DateTime<Utc>) -> Self {
        Self {
            sku: record.sku.clone(),
            url: Some(record.url.clone()),
            name: record.name.clone(),
            price: record.price,
            currency: record.currency.clone(),
            availability: record.availability,
            created_at: now,
            updated_at: now,
            delisted_at: None,
        }
    }

    /// Overwrite every mutable field from a fresh record; `created_at` and
    /// `delisted_at` are left alone.
    pub fn apply_record(&mut self, record: &ProductRecord, now: DateTime<Utc>) {
        self.url = Some(record.url.clone());
        self.name = record.name.clone();
        self.price = record.price;
        self.currency = record.currency.clone();
        self.availability = record.availability;
        self.updated_at = now;
    }

    pub fn is_delisted(&self) -> bool {
        self.delisted_at.is_some()
    }
}

/// Whether an availability change is notification-worthy.
///
/// Only unavailable/unknown -> available counts; a stockout never does.
pub fn is_restock(previous: Option<bool>, current: Option<bool>) -> bool {
    previous != Some(true) && current == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(availability: Option<bool>) -> ProductRecord {
        ProductRecord {
            sku: Sku::parse("10327701").unwrap(),
            url: "https://www.saq.com/fr/10327701".to_string(),
            name: Some("Château Test".to_string()),
            price: Some(21.5),
            currency: Some("CAD".to_string()),
            availability,
        }
    }

    #[test]
    fn restock_only_on_transition_to_available() {
        assert!(is_restock(None, Some(true)));
        assert!(is_restock(Some(false), Some(true)));
        assert!(!is_restock(Some(true), Some(true)));
        assert!(!is_restock(Some(true), Some(false)));
        assert!(!is_restock(Some(false), None));
        assert!(!is_restock(None, None));
    }

    #[test]
    fn apply_record_preserves_creation_metadata() {
        let created = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let mut product = Product::from_record(&record(Some(false)), created);
        product.delisted_at = Some(created);
        product.apply_record(&record(Some(true)), later);

        assert_eq!(product.created_at, created);
        assert_eq!(product.updated_at, later);
        assert_eq!(product.availability, Some(true));
        assert_eq!(product.delisted_at, Some(created));
    }
}

//! Strongly-typed identifiers used across the pipeline.
//!
//! Two families live here:
//! - database-assigned numeric ids (`RestockEventId`, `WatchId`)
//! - externally supplied string keys (`Sku`, `WatcherId`)

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Maximum accepted SKU length (matches the `products.sku` column).
pub const MAX_SKU_LENGTH: usize = 50;

/// Maximum accepted watcher identity length.
pub const MAX_WATCHER_ID_LENGTH: usize = 100;

/// Identifier of a restock event (BIGSERIAL in storage).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestockEventId(i64);

/// Identifier of a watch row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(i64);

macro_rules! impl_serial_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = i64::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_serial_newtype!(RestockEventId, "RestockEventId");
impl_serial_newtype!(WatchId, "WatchId");

/// Immutable external product identifier (primary key of the catalog).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    /// Validate and wrap a raw SKU.
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("Sku: empty"));
        }
        if trimmed.len() > MAX_SKU_LENGTH {
            return Err(DomainError::invalid_id(format!(
                "Sku: longer than {MAX_SKU_LENGTH} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Derive the SKU from a product page URL (its last non-empty path segment).
    ///
    /// `https://www.saq.com/fr/10327701` -> `10327701`
    pub fn from_product_url(url: &str) -> Result<Self, DomainError> {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        let segment = without_query
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        Self::parse(segment)
    }

    /// Catalog products carry purely numeric SKUs; recipes and accessories
    /// published in the same sitemap use slugs.
    pub fn is_catalog_product(&self) -> bool {
        self.0.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Sku {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Sku {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Sku> for String {
    fn from(value: Sku) -> Self {
        value.0
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque watcher identity, e.g. `tg:123456`.
///
/// The pipeline never interprets it; only the delivery side knows how to
/// route a given format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WatcherId(String);

impl WatcherId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(DomainError::invalid_id("WatcherId: empty"));
        }
        if raw.len() > MAX_WATCHER_ID_LENGTH {
            return Err(DomainError::invalid_id(format!(
                "WatcherId: longer than {MAX_WATCHER_ID_LENGTH} characters"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for WatcherId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WatcherId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<WatcherId> for String {
    fn from(value: WatcherId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_from_product_url_takes_last_segment() {
        let sku = Sku::from_product_url("https://www.saq.com/fr/10327701").unwrap();
        assert_eq!(sku.as_str(), "10327701");

        let sku = Sku::from_product_url("https://www.saq.com/fr/10327701/?utm=x").unwrap();
        assert_eq!(sku.as_str(), "10327701");
    }

    #[test]
    fn numeric_skus_are_catalog_products() {
        assert!(Sku::parse("10327701").unwrap().is_catalog_product());
        assert!(Sku::parse("1040").unwrap().is_catalog_product());
        assert!(!Sku::parse("aperol-spritz-ec").unwrap().is_catalog_product());
        assert!(!Sku::parse("boeuf-bourguignon").unwrap().is_catalog_product());
    }

    #[test]
    fn sku_rejects_empty_and_oversized() {
        assert!(Sku::parse("   ").is_err());
        assert!(Sku::parse("9".repeat(MAX_SKU_LENGTH + 1)).is_err());
        assert!(Sku::from_product_url("https://www.saq.com/").is_err());
    }

    #[test]
    fn sku_serde_is_transparent_and_validated() {
        let sku: Sku = serde_json::from_str("\"12345\"").unwrap();
        assert_eq!(serde_json::to_string(&sku).unwrap(), "\"12345\"");
        assert!(serde_json::from_str::<Sku>("\"\"").is_err());
    }

    #[test]
    fn watcher_id_bounds() {
        assert!(WatcherId::parse("tg:42").is_ok());
        assert!(WatcherId::parse("").is_err());
        assert!(WatcherId::parse("x".repeat(MAX_WATCHER_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn serial_ids_parse() {
        let id: RestockEventId = "17".parse().unwrap();
        assert_eq!(id.get(), 17);
        assert!("abc".parse::<WatchId>().is_err());
    }
}

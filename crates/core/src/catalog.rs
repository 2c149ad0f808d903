//! Catalog browsing: product filters and offset pagination.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::product::Product;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
/// Upper bound on the `q` search term, in characters.
pub const MAX_SEARCH_LENGTH: usize = 200;

/// Optional product filters; every set field must match.
///
/// A price bound never matches a product without a price, and `q` never
/// matches a product without a name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    /// Case-insensitive substring of the product name.
    pub q: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub available: Option<bool>,
}

impl ProductFilter {
    pub fn new(
        q: Option<String>,
        min_price: Option<f64>,
        max_price: Option<f64>,
        available: Option<bool>,
    ) -> DomainResult<Self> {
        let q = match q {
            Some(raw) => {
                let term = raw.trim().to_string();
                if term.is_empty() {
                    return Err(DomainError::validation("q must not be empty"));
                }
                if term.chars().count() > MAX_SEARCH_LENGTH {
                    return Err(DomainError::validation(format!(
                        "q must be at most {MAX_SEARCH_LENGTH} characters"
                    )));
                }
                Some(term)
            }
            None => None,
        };

        for (name, bound) in [("min_price", min_price), ("max_price", max_price)] {
            if bound.is_some_and(|value| !(value.is_finite() && value >= 0.0)) {
                return Err(DomainError::validation(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }

        Ok(Self {
            q,
            min_price,
            max_price,
            available,
        })
    }

    pub fn matches(&self, product: &Product) -> bool {
        if let Some(term) = &self.q {
            let needle = term.to_lowercase();
            let hit = product
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        let within_min = self
            .min_price
            .is_none_or(|min| product.price.is_some_and(|p| p >= min));
        let within_max = self
            .max_price
            .is_none_or(|max| product.price.is_some_and(|p| p <= max));
        let availability = self
            .available
            .is_none_or(|wanted| product.availability == Some(wanted));
        within_min && within_max && availability
    }
}

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if per_page == 0 || per_page > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "per_page must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, per_page })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of products plus the totals needed to page through the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    /// Matching products across all pages.
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u64,
}

impl ProductPage {
    pub fn new(products: Vec<Product>, total: u64, request: PageRequest) -> Self {
        Self {
            products,
            total,
            page: request.page(),
            per_page: request.per_page(),
            pages: total.div_ceil(u64::from(request.per_page())),
        }
    }
}

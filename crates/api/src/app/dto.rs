use serde::Deserialize;

use cellarwatch_core::{
    DomainError, PageRequest, ProductFilter, Sku, WatcherId, DEFAULT_PAGE_SIZE,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateWatchRequest {
    pub user_id: String,
    pub sku: String,
}

impl CreateWatchRequest {
    pub fn validate(self) -> Result<(WatcherId, Sku), DomainError> {
        Ok((WatcherId::parse(self.user_id)?, Sku::parse(self.sku)?))
    }
}

/// `?user_id=` on the watch list and delete endpoints.
#[derive(Debug, Deserialize)]
pub struct WatcherQuery {
    pub user_id: String,
}

impl WatcherQuery {
    pub fn validate(self) -> Result<WatcherId, DomainError> {
        WatcherId::parse(self.user_id)
    }
}

/// Query string of `GET /products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub q: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub available: Option<bool>,
}

impl ProductListQuery {
    pub fn validate(self) -> Result<(ProductFilter, PageRequest), DomainError> {
        let page = PageRequest::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        )?;
        let filter = ProductFilter::new(self.q, self.min_price, self.max_price, self.available)?;
        Ok((filter, page))
    }
}

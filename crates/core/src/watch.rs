//! User subscriptions to catalog items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{Sku, WatchId, WatcherId};
use crate::product::Product;

/// A (watcher, SKU) subscription. Unique per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    pub id: WatchId,
    pub user_id: WatcherId,
    pub sku: Sku,
    pub created_at: DateTime<Utc>,
}

/// A watch with its product joined in; the product may be gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchWithProduct {
    pub watch: Watch,
    pub product: Option<Product>,
}

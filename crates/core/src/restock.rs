//! Restock events and the notification rows derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{RestockEventId, Sku};

/// Durable record of an observed unavailable -> available transition.
///
/// Append-only. `processed_at` moves from `None` to a timestamp exactly once
/// (acknowledgment) and never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockEvent {
    pub id: RestockEventId,
    pub sku: Sku,
    pub available: bool,
    pub detected_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl RestockEvent {
    pub fn is_pending(&self) -> bool {
        self.processed_at.is_none() && self.available
    }
}

/// One (event, watcher) pair awaiting delivery.
///
/// This is also the wire shape of the fetch-pending endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub event_id: RestockEventId,
    pub sku: Sku,
    pub user_id: String,
    pub product_name: Option<String>,
    pub detected_at: DateTime<Utc>,
}

/// Body of the acknowledge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckRequest {
    pub event_ids: Vec<RestockEventId>,
}

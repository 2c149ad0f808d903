use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::warn;

use cellarwatch_core::{
    PageRequest, PendingNotification, Product, ProductFilter, ProductPage, ProductRecord,
    RestockEvent, RestockEventId, Sku, Watch, WatchWithProduct, WatcherId,
};

/// Storage operation error.
///
/// Conflict kinds are typed at this boundary so callers never have to inspect
/// driver messages to tell a duplicate from a dangling reference.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule rejected the write (e.g. duplicate watch).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored row could not be decoded into a domain value.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// The backend failed (connection, pool, lock, unexpected SQL error).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Whether an upsert created the product or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Inserted,
    Updated,
}

/// Result of persisting one scraped page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub kind: UpsertKind,
    /// Set when the write also appended a restock event.
    pub restock_event: Option<RestockEventId>,
}

/// Product table access used by the crawler.
///
/// ## Save semantics
///
/// `save_scrape()` writes the product upsert and (optionally) the restock event
/// as one unit: either both are persisted or neither is. A failed save leaves
/// the previous product state untouched so the next run re-evaluates it.
///
/// ## Reconciliation semantics
///
/// `mark_delisted()` / `clear_delisted()` are conditional bulk updates. They
/// only touch rows whose `delisted_at` is currently null / non-null
/// respectively and return the number of rows actually changed, so repeating
/// a call with the same input changes nothing.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// `sku -> calendar date (UTC) of the last successful crawl write`.
    async fn updated_dates(&self) -> Result<HashMap<Sku, NaiveDate>, StoreError>;

    /// `sku -> availability as last stored`.
    async fn availability_snapshot(&self) -> Result<HashMap<Sku, Option<bool>>, StoreError>;

    /// Upsert a scraped record keyed by SKU, appending a restock event in the
    /// same unit of work when `emit_restock` is set.
    async fn save_scrape(
        &self,
        record: &ProductRecord,
        emit_restock: bool,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, StoreError>;

    async fn get_product(&self, sku: &Sku) -> Result<Option<Product>, StoreError>;

    /// Products matching `filter`, ordered by name (unnamed last) then SKU.
    /// Delisted products are included.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<ProductPage, StoreError>;

    /// Every stored SKU, delisted or not.
    async fn stored_skus(&self) -> Result<HashSet<Sku>, StoreError>;

    /// SKUs whose `delisted_at` is set.
    async fn delisted_skus(&self) -> Result<HashSet<Sku>, StoreError>;

    /// Set `delisted_at = now` where it is currently null.
    async fn mark_delisted(&self, skus: &[Sku], now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Clear `delisted_at` where it is currently set.
    async fn clear_delisted(&self, skus: &[Sku]) -> Result<u64, StoreError>;
}

/// Restock event table plus the read/ack boundary used by the gateway.
///
/// ## Pending semantics
///
/// An event is pending iff `processed_at` is null (and `available` is true).
/// `find_pending_notifications()` returns one row per (event, watcher) pair,
/// oldest `detected_at` first, never more than `limit` rows. Rows of a single
/// event are not split across batches unless that event alone exceeds the
/// limit.
///
/// ## Ack semantics
///
/// `ack_events()` only stamps events that are still pending and returns how
/// many it stamped. Unknown or already-processed ids are ignored.
#[async_trait]
pub trait RestockEventStore: Send + Sync {
    /// Append a standalone restock event.
    async fn append_restock(
        &self,
        sku: &Sku,
        detected_at: DateTime<Utc>,
    ) -> Result<RestockEvent, StoreError>;

    async fn get_event(&self, id: RestockEventId) -> Result<Option<RestockEvent>, StoreError>;

    async fn find_pending_notifications(
        &self,
        limit: usize,
    ) -> Result<Vec<PendingNotification>, StoreError>;

    async fn ack_events(
        &self,
        ids: &[RestockEventId],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

/// Watch subscriptions.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Create a watch. `NotFound` when the SKU is not in the catalog,
    /// `Conflict` when the pair already exists.
    async fn create_watch(
        &self,
        user_id: &WatcherId,
        sku: &Sku,
        now: DateTime<Utc>,
    ) -> Result<Watch, StoreError>;

    /// A watcher's subscriptions, newest first.
    async fn list_watches(&self, user_id: &WatcherId) -> Result<Vec<WatchWithProduct>, StoreError>;

    /// Remove a watch. `NotFound` when it does not exist.
    async fn delete_watch(&self, user_id: &WatcherId, sku: &Sku) -> Result<(), StoreError>;
}

/// Drop the trailing event of an over-fetched batch when its watcher rows
/// continue past the limit.
///
/// `rows` must be ordered by event and hold at most `limit + 1` entries. The
/// extra row is only a lookahead: if it belongs to the same event as the last row
/// inside the limit, that event is cut from the batch so a later ack cannot
/// retire it before all its watchers were delivered. An event that alone
/// exceeds the limit is returned truncated, since nothing else would make
/// progress.
pub(crate) fn trim_to_event_boundary(
    mut rows: Vec<PendingNotification>,
    limit: usize,
) -> Vec<PendingNotification> {
    if rows.len() <= limit || limit == 0 {
        rows.truncate(limit);
        return rows;
    }

    let lookahead = rows[limit].event_id;
    rows.truncate(limit);

    if rows.last().map(|r| r.event_id) == Some(lookahead) {
        let keep = rows.iter().take_while(|r| r.event_id != lookahead).count();
        if keep > 0 {
            rows.truncate(keep);
        } else {
            // Acking this batch retires the event for every watcher.
            warn!(
                event_id = %lookahead,
                sku = %rows[0].sku,
                limit,
                "restock event has more watchers than the batch limit; watchers past the limit will not be notified"
            );
        }
    }

    rows
}

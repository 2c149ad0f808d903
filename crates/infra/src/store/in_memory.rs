use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use cellarwatch_core::{
    PageRequest, PendingNotification, Product, ProductFilter, ProductPage, ProductRecord,
    RestockEvent, RestockEventId, Sku, Watch, WatchId, WatchWithProduct, WatcherId,
};

use super::r#trait::{
    trim_to_event_boundary, CatalogStore, RestockEventStore, SaveOutcome, StoreError,
    UpsertKind, WatchStore,
};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<Sku, Product>,
    events: Vec<RestockEvent>,
    watches: Vec<Watch>,
    next_event_id: i64,
    next_watch_id: i64,
}

impl State {
    fn append_event(&mut self, sku: &Sku, detected_at: DateTime<Utc>) -> RestockEvent {
        self.next_event_id += 1;
        let event = RestockEvent {
            id: RestockEventId::new(self.next_event_id),
            sku: sku.clone(),
            available: true,
            detected_at,
            processed_at: None,
        };
        self.events.push(event.clone());
        event
    }
}

/// In-memory catalog, event and watch store.
///
/// Intended for tests/dev. Every operation takes one lock, which gives the
/// same all-or-nothing behaviour the Postgres store gets from transactions.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event, in append order.
    pub fn events(&self) -> Result<Vec<RestockEvent>, StoreError> {
        Ok(self.read()?.events.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn updated_dates(&self) -> Result<HashMap<Sku, NaiveDate>, StoreError> {
        let state = self.read()?;
        Ok(state
            .products
            .values()
            .map(|p| (p.sku.clone(), p.updated_at.date_naive()))
            .collect())
    }

    async fn availability_snapshot(&self) -> Result<HashMap<Sku, Option<bool>>, StoreError> {
        let state = self.read()?;
        Ok(state
            .products
            .values()
            .map(|p| (p.sku.clone(), p.availability))
            .collect())
    }

    async fn save_scrape(
        &self,
        record: &ProductRecord,
        emit_restock: bool,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, StoreError> {
        let mut state = self.write()?;

        let kind = match state.products.get_mut(&record.sku) {
            Some(existing) => {
                existing.apply_record(record, now);
                UpsertKind::Updated
            }
            None => {
                state
                    .products
                    .insert(record.sku.clone(), Product::from_record(record, now));
                UpsertKind::Inserted
            }
        };

        let restock_event = emit_restock.then(|| state.append_event(&record.sku, now).id);

        Ok(SaveOutcome {
            kind,
            restock_event,
        })
    }

    async fn get_product(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(sku).cloned())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<ProductPage, StoreError> {
        let state = self.read()?;

        let mut matching: Vec<&Product> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        matching.sort_by(|a, b| {
            (a.name.is_none(), &a.name, &a.sku).cmp(&(b.name.is_none(), &b.name, &b.sku))
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let products = matching
            .into_iter()
            .skip(offset)
            .take(page.per_page() as usize)
            .cloned()
            .collect();

        Ok(ProductPage::new(products, total, page))
    }

    async fn stored_skus(&self) -> Result<HashSet<Sku>, StoreError> {
        Ok(self.read()?.products.keys().cloned().collect())
    }

    async fn delisted_skus(&self) -> Result<HashSet<Sku>, StoreError> {
        Ok(self
            .read()?
            .products
            .values()
            .filter(|p| p.is_delisted())
            .map(|p| p.sku.clone())
            .collect())
    }

    async fn mark_delisted(&self, skus: &[Sku], now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let mut changed = 0;
        for sku in skus {
            if let Some(product) = state.products.get_mut(sku) {
                if product.delisted_at.is_none() {
                    product.delisted_at = Some(now);
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn clear_delisted(&self, skus: &[Sku]) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let mut changed = 0;
        for sku in skus {
            if let Some(product) = state.products.get_mut(sku) {
                if product.delisted_at.take().is_some() {
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl RestockEventStore for InMemoryStore {
    async fn append_restock(
        &self,
        sku: &Sku,
        detected_at: DateTime<Utc>,
    ) -> Result<RestockEvent, StoreError> {
        Ok(self.write()?.append_event(sku, detected_at))
    }

    async fn get_event(&self, id: RestockEventId) -> Result<Option<RestockEvent>, StoreError> {
        Ok(self.read()?.events.iter().find(|e| e.id == id).cloned())
    }

    async fn find_pending_notifications(
        &self,
        limit: usize,
    ) -> Result<Vec<PendingNotification>, StoreError> {
        let state = self.read()?;

        let mut pending: Vec<&RestockEvent> =
            state.events.iter().filter(|e| e.is_pending()).collect();
        pending.sort_by_key(|e| (e.detected_at, e.id));

        let mut rows = Vec::new();
        'events: for event in pending {
            let product_name = state
                .products
                .get(&event.sku)
                .and_then(|p| p.name.clone());

            for watch in state.watches.iter().filter(|w| w.sku == event.sku) {
                rows.push(PendingNotification {
                    event_id: event.id,
                    sku: event.sku.clone(),
                    user_id: watch.user_id.to_string(),
                    product_name: product_name.clone(),
                    detected_at: event.detected_at,
                });
                if rows.len() > limit {
                    break 'events;
                }
            }
        }

        Ok(trim_to_event_boundary(rows, limit))
    }

    async fn ack_events(
        &self,
        ids: &[RestockEventId],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let wanted: HashSet<RestockEventId> = ids.iter().copied().collect();
        let mut state = self.write()?;
        let mut changed = 0;
        for event in state.events.iter_mut() {
            if wanted.contains(&event.id) && event.processed_at.is_none() {
                event.processed_at = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl WatchStore for InMemoryStore {
    async fn create_watch(
        &self,
        user_id: &WatcherId,
        sku: &Sku,
        now: DateTime<Utc>,
    ) -> Result<Watch, StoreError> {
        let mut state = self.write()?;

        if !state.products.contains_key(sku) {
            return Err(StoreError::NotFound(format!("product {sku}")));
        }
        if state
            .watches
            .iter()
            .any(|w| &w.user_id == user_id && &w.sku == sku)
        {
            return Err(StoreError::Conflict(format!(
                "user {user_id} already watches SKU {sku}"
            )));
        }

        state.next_watch_id += 1;
        let watch = Watch {
            id: WatchId::new(state.next_watch_id),
            user_id: user_id.clone(),
            sku: sku.clone(),
            created_at: now,
        };
        state.watches.push(watch.clone());
        Ok(watch)
    }

    async fn list_watches(&self, user_id: &WatcherId) -> Result<Vec<WatchWithProduct>, StoreError> {
        let state = self.read()?;
        let mut watches: Vec<&Watch> = state
            .watches
            .iter()
            .filter(|w| &w.user_id == user_id)
            .collect();
        watches.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(watches
            .into_iter()
            .map(|w| WatchWithProduct {
                watch: w.clone(),
                product: state.products.get(&w.sku).cloned(),
            })
            .collect())
    }

    async fn delete_watch(&self, user_id: &WatcherId, sku: &Sku) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let before = state.watches.len();
        state
            .watches
            .retain(|w| !(&w.user_id == user_id && &w.sku == sku));
        if state.watches.len() == before {
            return Err(StoreError::NotFound(format!("watch {sku}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sku(raw: &str) -> Sku {
        Sku::parse(raw).unwrap()
    }

    fn watcher(raw: &str) -> WatcherId {
        WatcherId::parse(raw).unwrap()
    }

    fn record(raw: &str, availability: Option<bool>) -> ProductRecord {
        ProductRecord {
            sku: sku(raw),
            url: format!("https://www.saq.com/fr/{raw}"),
            name: Some(format!("Wine {raw}")),
            price: Some(19.95),
            currency: Some("CAD".to_string()),
            availability,
        }
    }

    #[tokio::test]
    async fn save_scrape_inserts_then_updates() {
        let store = InMemoryStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::hours(1);

        let first = store.save_scrape(&record("1", Some(false)), false, t0).await.unwrap();
        assert_eq!(first.kind, UpsertKind::Inserted);
        assert_eq!(first.restock_event, None);

        let second = store.save_scrape(&record("1", Some(true)), true, t1).await.unwrap();
        assert_eq!(second.kind, UpsertKind::Updated);
        assert!(second.restock_event.is_some());

        let product = store.get_product(&sku("1")).await.unwrap().unwrap();
        assert_eq!(product.created_at, t0);
        assert_eq!(product.updated_at, t1);
        assert_eq!(store.events().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_delisted_is_idempotent() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for raw in ["1", "2", "3"] {
            store.save_scrape(&record(raw, Some(true)), false, now).await.unwrap();
        }

        let gone = vec![sku("1"), sku("2")];
        assert_eq!(store.mark_delisted(&gone, now).await.unwrap(), 2);
        assert_eq!(store.mark_delisted(&gone, now).await.unwrap(), 0);

        assert_eq!(store.clear_delisted(&[sku("1")]).await.unwrap(), 1);
        assert_eq!(store.clear_delisted(&[sku("1")]).await.unwrap(), 0);
        assert_eq!(
            store.delisted_skus().await.unwrap(),
            HashSet::from([sku("2")])
        );
    }

    #[tokio::test]
    async fn ack_is_idempotent_and_ignores_unknown_ids() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let a = store.append_restock(&sku("1"), now).await.unwrap();
        let b = store.append_restock(&sku("2"), now).await.unwrap();

        let ids = vec![a.id, b.id, RestockEventId::new(999)];
        assert_eq!(store.ack_events(&ids, now).await.unwrap(), 2);
        assert_eq!(store.ack_events(&ids, now).await.unwrap(), 0);

        let stamped = store.get_event(a.id).await.unwrap().unwrap();
        assert_eq!(stamped.processed_at, Some(now));
    }

    #[tokio::test]
    async fn pending_rows_fan_out_per_watcher_oldest_first() {
        let store = InMemoryStore::new();
        let t0 = Utc::now();
        for raw in ["1", "2"] {
            store.save_scrape(&record(raw, Some(true)), false, t0).await.unwrap();
        }
        store.create_watch(&watcher("tg:1"), &sku("1"), t0).await.unwrap();
        store.create_watch(&watcher("tg:2"), &sku("1"), t0).await.unwrap();
        store.create_watch(&watcher("tg:1"), &sku("2"), t0).await.unwrap();

        let late = store.append_restock(&sku("2"), t0 + Duration::minutes(5)).await.unwrap();
        let early = store.append_restock(&sku("1"), t0).await.unwrap();
        // No watchers: never surfaces.
        store.append_restock(&sku("3"), t0).await.unwrap();

        let rows = store.find_pending_notifications(10).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].detected_at <= w[1].detected_at));
        assert_eq!(rows[0].event_id, early.id);
        assert_eq!(rows[1].event_id, early.id);
        assert_eq!(rows[2].event_id, late.id);
        assert_eq!(rows[2].product_name.as_deref(), Some("Wine 2"));

        store.ack_events(&[early.id], t0).await.unwrap();
        let rows = store.find_pending_notifications(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_id, late.id);
    }

    #[tokio::test]
    async fn pending_rows_respect_limit() {
        let store = InMemoryStore::new();
        let t0 = Utc::now();
        store.save_scrape(&record("1", Some(true)), false, t0).await.unwrap();
        store.create_watch(&watcher("tg:1"), &sku("1"), t0).await.unwrap();
        for i in 0..5 {
            store
                .append_restock(&sku("1"), t0 + Duration::seconds(i))
                .await
                .unwrap();
        }

        let rows = store.find_pending_notifications(3).await.unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn list_products_filters_sorts_and_pages() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let priced = |raw: &str, name: Option<&str>, price: f64, availability: Option<bool>| {
            let mut r = record(raw, availability);
            r.name = name.map(str::to_string);
            r.price = Some(price);
            r
        };
        let records = vec![
            priced("1", Some("Zinfandel"), 30.0, Some(true)),
            priced("2", Some("Château Margaux"), 120.0, Some(false)),
            priced("3", None, 15.0, Some(true)),
            priced("4", Some("Chablis"), 25.0, Some(true)),
        ];
        for r in &records {
            store.save_scrape(r, false, now).await.unwrap();
        }

        let all = store
            .list_products(&ProductFilter::default(), PageRequest::new(1, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(all.total, 4);
        assert_eq!(all.pages, 2);
        let names: Vec<_> = all.products.iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec![Some("Chablis".into()), Some("Château Margaux".into())]);

        let last = store
            .list_products(&ProductFilter::default(), PageRequest::new(2, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(last.products[1].sku, sku("3"));

        let filter = ProductFilter::new(None, Some(20.0), Some(50.0), Some(true)).unwrap();
        let cheap = store
            .list_products(&filter, PageRequest::default())
            .await
            .unwrap();
        let skus: Vec<_> = cheap.products.iter().map(|p| p.sku.clone()).collect();
        assert_eq!(skus, vec![sku("4"), sku("1")]);

        let search = ProductFilter::new(Some("CH".into()), None, None, None).unwrap();
        let found = store
            .list_products(&search, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(found.total, 2);

        let beyond = store
            .list_products(&ProductFilter::default(), PageRequest::new(9, 2).unwrap())
            .await
            .unwrap();
        assert!(beyond.products.is_empty());
        assert_eq!(beyond.total, 4);
    }

    #[tokio::test]
    async fn watch_creation_reports_typed_conflicts() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let missing = store.create_watch(&watcher("tg:1"), &sku("404"), now).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        store.save_scrape(&record("1", None), false, now).await.unwrap();
        store.create_watch(&watcher("tg:1"), &sku("1"), now).await.unwrap();
        let duplicate = store.create_watch(&watcher("tg:1"), &sku("1"), now).await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

        store.delete_watch(&watcher("tg:1"), &sku("1")).await.unwrap();
        let again = store.delete_watch(&watcher("tg:1"), &sku("1")).await;
        assert!(matches!(again, Err(StoreError::NotFound(_))));
    }
}

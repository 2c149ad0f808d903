//! Delist products that left the sitemap; relist the ones that came back.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::info;

use cellarwatch_core::Sku;
use cellarwatch_infra::store::{CatalogStore, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub delisted: u64,
    pub relisted: u64,
}

/// Compare the stored catalog against a complete sitemap SKU set.
///
/// Both updates are conditional, so repeating a run against the same
/// snapshot reports zero changes. Callers treat an error as "skip this step".
pub async fn reconcile(
    catalog: &dyn CatalogStore,
    sitemap_skus: &HashSet<Sku>,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, StoreError> {
    let stored = catalog.stored_skus().await?;
    let delisted = catalog.delisted_skus().await?;

    let mut to_delist: Vec<Sku> = stored.difference(sitemap_skus).cloned().collect();
    let mut to_relist: Vec<Sku> = delisted.intersection(sitemap_skus).cloned().collect();
    to_delist.sort();
    to_relist.sort();

    let outcome = ReconcileOutcome {
        delisted: catalog.mark_delisted(&to_delist, now).await?,
        relisted: catalog.clear_delisted(&to_relist).await?,
    };

    info!(
        delisted = outcome.delisted,
        relisted = outcome.relisted,
        "catalog reconciled"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellarwatch_core::ProductRecord;
    use cellarwatch_infra::store::InMemoryStore;

    fn sku(raw: &str) -> Sku {
        Sku::parse(raw).unwrap()
    }

    async fn seeded(skus: &[&str]) -> InMemoryStore {
        let store = InMemoryStore::new();
        for raw in skus {
            let record = ProductRecord {
                sku: sku(raw),
                url: format!("https://www.saq.com/fr/{raw}"),
                name: None,
                price: None,
                currency: None,
                availability: Some(true),
            };
            store.save_scrape(&record, false, Utc::now()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn delists_missing_and_relists_returning() {
        let store = seeded(&["1", "2", "3"]).await;
        let now = Utc::now();

        let first = reconcile(&store, &HashSet::from([sku("1")]), now).await.unwrap();
        assert_eq!(first, ReconcileOutcome { delisted: 2, relisted: 0 });

        let repeat = reconcile(&store, &HashSet::from([sku("1")]), now).await.unwrap();
        assert_eq!(repeat, ReconcileOutcome::default());

        let back = reconcile(&store, &HashSet::from([sku("1"), sku("2")]), now)
            .await
            .unwrap();
        assert_eq!(back, ReconcileOutcome { delisted: 0, relisted: 1 });
        assert_eq!(store.delisted_skus().await.unwrap(), HashSet::from([sku("3")]));
    }
}

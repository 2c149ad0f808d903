//! Postgres-backed catalog, restock event and watch store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate (user, sku) watch raced past the insert guard |
//! | Database (foreign key violation) | `23503` | `NotFound` | Watch references a SKU that was never stored |
//! | Database (check constraint violation) | `23514` | `Backend` | Schema rejected a value |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | Anything else | N/A | `Backend` | Pool closed, network, decode failures |
//!
//! ## Atomicity
//!
//! `save_scrape()` runs the product upsert and the restock insert in one
//! transaction. Delist/relist and ack are single conditional `UPDATE`s, so
//! concurrent callers cannot double-stamp a row.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{instrument, Span};

use cellarwatch_core::{
    PageRequest, PendingNotification, Product, ProductFilter, ProductPage, ProductRecord,
    RestockEvent, RestockEventId, Sku, Watch, WatchId, WatchWithProduct, WatcherId,
};

use super::r#trait::{
    trim_to_event_boundary, CatalogStore, RestockEventStore, SaveOutcome, StoreError,
    UpsertKind, WatchStore,
};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn sku_strings(skus: &[Sku]) -> Vec<String> {
    skus.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn updated_dates(&self) -> Result<HashMap<Sku, NaiveDate>, StoreError> {
        let rows = sqlx::query("SELECT sku, updated_at FROM products")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("updated_dates", e))?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let sku = decode_sku(&row, "sku")?;
            let updated_at: DateTime<Utc> = row
                .try_get("updated_at")
                .map_err(|e| map_sqlx_error("updated_dates", e))?;
            out.insert(sku, updated_at.date_naive());
        }
        Ok(out)
    }

    #[instrument(skip(self), err)]
    async fn availability_snapshot(&self) -> Result<HashMap<Sku, Option<bool>>, StoreError> {
        let rows = sqlx::query("SELECT sku, availability FROM products")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("availability_snapshot", e))?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let sku = decode_sku(&row, "sku")?;
            let availability: Option<bool> = row
                .try_get("availability")
                .map_err(|e| map_sqlx_error("availability_snapshot", e))?;
            out.insert(sku, availability);
        }
        Ok(out)
    }

    #[instrument(skip(self, record), fields(sku = %record.sku), err)]
    async fn save_scrape(
        &self,
        record: &ProductRecord,
        emit_restock: bool,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // xmax = 0 only for freshly inserted tuples.
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO products (sku, url, name, price, currency, availability, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (sku) DO UPDATE SET
                url = EXCLUDED.url,
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                currency = EXCLUDED.currency,
                availability = EXCLUDED.availability,
                updated_at = EXCLUDED.updated_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(record.sku.as_str())
        .bind(&record.url)
        .bind(&record.name)
        .bind(record.price)
        .bind(&record.currency)
        .bind(record.availability)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_product", e))?;

        let restock_event = if emit_restock {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO restock_events (sku, available, detected_at)
                VALUES ($1, TRUE, $2)
                RETURNING id
                "#,
            )
            .bind(record.sku.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_restock_event", e))?;
            Some(RestockEventId::new(id))
        } else {
            None
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(SaveOutcome {
            kind: if inserted {
                UpsertKind::Inserted
            } else {
                UpsertKind::Updated
            },
            restock_event,
        })
    }

    #[instrument(skip(self), fields(sku = %sku), err)]
    async fn get_product(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT sku, url, name, price, currency, availability, created_at, updated_at, delisted_at
            FROM products
            WHERE sku = $1
            "#,
        )
        .bind(sku.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), fields(page = page.page(), per_page = page.per_page()), err)]
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<ProductPage, StoreError> {
        // NULL parameters disable their predicate; the WHERE clause is shared by
        // the count and the page query.
        const FILTER: &str = r#"
            ($1::TEXT IS NULL OR position(lower($1) IN lower(name)) > 0)
            AND ($2::DOUBLE PRECISION IS NULL OR price >= $2)
            AND ($3::DOUBLE PRECISION IS NULL OR price <= $3)
            AND ($4::BOOLEAN IS NULL OR availability = $4)
        "#;

        let count_sql = format!("SELECT COUNT(*) FROM products WHERE {FILTER}");
        let page_sql = format!(
            r#"
            SELECT sku, url, name, price, currency, availability, created_at, updated_at, delisted_at
            FROM products
            WHERE {FILTER}
            ORDER BY name ASC NULLS LAST, sku ASC
            LIMIT $5 OFFSET $6
            "#
        );

        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.q.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.available)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?;

        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        let rows = sqlx::query(&page_sql)
            .bind(filter.q.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.available)
            .bind(i64::from(page.per_page()))
            .bind(offset)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        let products = rows
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProductPage::new(products, total.max(0) as u64, page))
    }

    #[instrument(skip(self), err)]
    async fn stored_skus(&self) -> Result<HashSet<Sku>, StoreError> {
        let rows = sqlx::query("SELECT sku FROM products")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stored_skus", e))?;
        rows.iter().map(|r| decode_sku(r, "sku")).collect()
    }

    #[instrument(skip(self), err)]
    async fn delisted_skus(&self) -> Result<HashSet<Sku>, StoreError> {
        let rows = sqlx::query("SELECT sku FROM products WHERE delisted_at IS NOT NULL")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delisted_skus", e))?;
        rows.iter().map(|r| decode_sku(r, "sku")).collect()
    }

    #[instrument(
        skip(self, skus),
        fields(requested = skus.len(), changed = tracing::field::Empty),
        err
    )]
    async fn mark_delisted(&self, skus: &[Sku], now: DateTime<Utc>) -> Result<u64, StoreError> {
        if skus.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE products
            SET delisted_at = $2
            WHERE sku = ANY($1) AND delisted_at IS NULL
            "#,
        )
        .bind(sku_strings(skus))
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_delisted", e))?;

        Span::current().record("changed", result.rows_affected());
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, skus), fields(requested = skus.len()), err)]
    async fn clear_delisted(&self, skus: &[Sku]) -> Result<u64, StoreError> {
        if skus.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE products
            SET delisted_at = NULL
            WHERE sku = ANY($1) AND delisted_at IS NOT NULL
            "#,
        )
        .bind(sku_strings(skus))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("clear_delisted", e))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RestockEventStore for PostgresStore {
    #[instrument(skip(self), fields(sku = %sku), err)]
    async fn append_restock(
        &self,
        sku: &Sku,
        detected_at: DateTime<Utc>,
    ) -> Result<RestockEvent, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO restock_events (sku, available, detected_at)
            VALUES ($1, TRUE, $2)
            RETURNING id, sku, available, detected_at, processed_at
            "#,
        )
        .bind(sku.as_str())
        .bind(detected_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_restock", e))?;

        event_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn get_event(&self, id: RestockEventId) -> Result<Option<RestockEvent>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, available, detected_at, processed_at
            FROM restock_events
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_event", e))?;

        row.as_ref().map(event_from_row).transpose()
    }

    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn find_pending_notifications(
        &self,
        limit: usize,
    ) -> Result<Vec<PendingNotification>, StoreError> {
        // One extra row is fetched as a lookahead for trim_to_event_boundary.
        let fetch = i64::try_from(limit.saturating_add(1)).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT e.id, e.sku, e.detected_at, w.user_id, p.name
            FROM restock_events e
            JOIN watches w ON w.sku = e.sku
            LEFT JOIN products p ON p.sku = e.sku
            WHERE e.processed_at IS NULL AND e.available = TRUE
            ORDER BY e.detected_at ASC, e.id ASC, w.id ASC
            LIMIT $1
            "#,
        )
        .bind(fetch)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_pending_notifications", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(PendingNotification {
                event_id: RestockEventId::new(
                    row.try_get("id")
                        .map_err(|e| map_sqlx_error("find_pending_notifications", e))?,
                ),
                sku: decode_sku(row, "sku")?,
                user_id: row
                    .try_get("user_id")
                    .map_err(|e| map_sqlx_error("find_pending_notifications", e))?,
                product_name: row
                    .try_get("name")
                    .map_err(|e| map_sqlx_error("find_pending_notifications", e))?,
                detected_at: row
                    .try_get("detected_at")
                    .map_err(|e| map_sqlx_error("find_pending_notifications", e))?,
            });
        }

        let trimmed = trim_to_event_boundary(out, limit);
        Span::current().record("row_count", trimmed.len());
        Ok(trimmed)
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    async fn ack_events(
        &self,
        ids: &[RestockEventId],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let result = sqlx::query(
            r#"
            UPDATE restock_events
            SET processed_at = $2
            WHERE id = ANY($1) AND processed_at IS NULL
            "#,
        )
        .bind(raw)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ack_events", e))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl WatchStore for PostgresStore {
    #[instrument(skip(self), fields(user_id = %user_id, sku = %sku), err)]
    async fn create_watch(
        &self,
        user_id: &WatcherId,
        sku: &Sku,
        now: DateTime<Utc>,
    ) -> Result<Watch, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE sku = $1)")
                .bind(sku.as_str())
                .fetch_one(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("create_watch", e))?;
        if !exists {
            return Err(StoreError::NotFound(format!("product {sku}")));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO watches (user_id, sku, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, sku) DO NOTHING
            RETURNING id, user_id, sku, created_at
            "#,
        )
        .bind(user_id.as_str())
        .bind(sku.as_str())
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_watch", e))?;

        match row {
            Some(row) => watch_from_row(&row, ""),
            None => Err(StoreError::Conflict(format!(
                "user {user_id} already watches SKU {sku}"
            ))),
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn list_watches(&self, user_id: &WatcherId) -> Result<Vec<WatchWithProduct>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                w.id AS w_id, w.user_id AS w_user_id, w.sku AS w_sku, w.created_at AS w_created_at,
                p.sku, p.url, p.name, p.price, p.currency, p.availability,
                p.created_at, p.updated_at, p.delisted_at
            FROM watches w
            LEFT JOIN products p ON p.sku = w.sku
            WHERE w.user_id = $1
            ORDER BY w.created_at DESC, w.id DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_watches", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let watch = watch_from_row(row, "w_")?;
            let joined: Option<String> = row
                .try_get("sku")
                .map_err(|e| map_sqlx_error("list_watches", e))?;
            let product = match joined {
                Some(_) => Some(product_from_row(row)?),
                None => None,
            };
            out.push(WatchWithProduct { watch, product });
        }
        Ok(out)
    }

    #[instrument(skip(self), fields(user_id = %user_id, sku = %sku), err)]
    async fn delete_watch(&self, user_id: &WatcherId, sku: &Sku) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM watches WHERE user_id = $1 AND sku = $2")
            .bind(user_id.as_str())
            .bind(sku.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_watch", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("watch {sku}")));
        }
        Ok(())
    }
}

// Row decoding

fn decode_sku(row: &PgRow, column: &str) -> Result<Sku, StoreError> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| map_sqlx_error("decode_sku", e))?;
    Sku::parse(raw).map_err(|e| StoreError::InvalidRow(e.to_string()))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let decode = |e| map_sqlx_error("decode_product", e);
    Ok(Product {
        sku: decode_sku(row, "sku")?,
        url: row.try_get("url").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        price: row.try_get("price").map_err(decode)?,
        currency: row.try_get("currency").map_err(decode)?,
        availability: row.try_get("availability").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
        delisted_at: row.try_get("delisted_at").map_err(decode)?,
    })
}

fn event_from_row(row: &PgRow) -> Result<RestockEvent, StoreError> {
    let decode = |e| map_sqlx_error("decode_restock_event", e);
    Ok(RestockEvent {
        id: RestockEventId::new(row.try_get("id").map_err(decode)?),
        sku: decode_sku(row, "sku")?,
        available: row.try_get("available").map_err(decode)?,
        detected_at: row.try_get("detected_at").map_err(decode)?,
        processed_at: row.try_get("processed_at").map_err(decode)?,
    })
}

fn watch_from_row(row: &PgRow, prefix: &str) -> Result<Watch, StoreError> {
    let decode = |e| map_sqlx_error("decode_watch", e);
    let user_id: String = row.try_get(format!("{prefix}user_id").as_str()).map_err(decode)?;
    Ok(Watch {
        id: WatchId::new(row.try_get(format!("{prefix}id").as_str()).map_err(decode)?),
        user_id: WatcherId::parse(user_id).map_err(|e| StoreError::InvalidRow(e.to_string()))?,
        sku: decode_sku(row, &format!("{prefix}sku"))?,
        created_at: row
            .try_get(format!("{prefix}created_at").as_str())
            .map_err(decode)?,
    })
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::InvalidRow(format!("{operation}: {err}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed during {}", operation))
        }
        other => StoreError::Backend(format!("{}: {}", operation, other)),
    }
}

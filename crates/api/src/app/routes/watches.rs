use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use chrono::Utc;

use cellarwatch_core::{Sku, WatchWithProduct};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_watch).get(list_watches))
        .route("/:sku", delete(delete_watch))
}

pub async fn create_watch(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateWatchRequest>,
) -> axum::response::Response {
    let (user_id, sku) = match body.validate() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let watch = match services.watches.create_watch(&user_id, &sku, Utc::now()).await {
        Ok(w) => w,
        Err(e) => return errors::store_error_to_response(e),
    };

    let product = match services.catalog.get_product(&sku).await {
        Ok(p) => p,
        Err(e) => return errors::store_error_to_response(e),
    };

    tracing::info!(user_id = %user_id, sku = %sku, "watch created");
    (StatusCode::CREATED, Json(WatchWithProduct { watch, product })).into_response()
}

pub async fn list_watches(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::WatcherQuery>,
) -> axum::response::Response {
    let user_id = match query.validate() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.watches.list_watches(&user_id).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_watch(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
    Query(query): Query<dto::WatcherQuery>,
) -> axum::response::Response {
    let user_id = match query.validate() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let sku = match Sku::parse(sku) {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.watches.delete_watch(&user_id, &sku).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use cellarwatch_core::{AckRequest, RestockEventId};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/notifications", get(list_pending))
        .route("/notifications/ack", post(ack))
}

/// One row per (event, watcher), oldest first, at most `limits.fetch()` rows.
pub async fn list_pending(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services
        .events
        .find_pending_notifications(services.limits.fetch())
        .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn ack(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<AckRequest>,
) -> axum::response::Response {
    let limit = services.limits.ack();
    if body.event_ids.is_empty() || body.event_ids.len() > limit {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            format!("event_ids must contain between 1 and {limit} ids"),
        );
    }

    let ids: Vec<RestockEventId> = body.event_ids;
    match services.events.ack_events(&ids, Utc::now()).await {
        Ok(stamped) => {
            tracing::info!(requested = ids.len(), stamped, "acknowledged restock events");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

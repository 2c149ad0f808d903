use axum::Router;

pub mod notifications;
pub mod products;
pub mod system;
pub mod watches;

/// Router for the `/api/v1` surface.
pub fn router() -> Router {
    Router::new()
        .nest(
            "/watches",
            watches::router().merge(notifications::router()),
        )
        .nest("/products", products::router())
}

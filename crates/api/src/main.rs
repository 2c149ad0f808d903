use std::sync::Arc;

use anyhow::Context;

use cellarwatch_api::app::{self, AppServices};
use cellarwatch_api::config::ApiConfig;
use cellarwatch_infra::{db, store::PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    cellarwatch_observability::init("cellarwatch-api");

    let config = ApiConfig::from_env().context("invalid API configuration")?;

    let services = match &config.database_url {
        Some(url) => {
            let pool = db::connect(url, 10).await.context("database connection failed")?;
            db::migrate(&pool).await.context("database migration failed")?;
            AppServices::from_store(Arc::new(PostgresStore::new(pool)), config.limits)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            AppServices::in_memory(config.limits)
        }
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        fetch_limit = config.limits.fetch(),
        ack_limit = config.limits.ack(),
        "listening"
    );

    axum::serve(listener, app::build_app(services))
        .await
        .context("server error")?;
    Ok(())
}

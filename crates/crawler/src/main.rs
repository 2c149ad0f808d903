use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use cellarwatch_crawler::config::CrawlConfig;
use cellarwatch_crawler::fetcher::HttpFetcher;
use cellarwatch_crawler::parser::JsonLdParser;
use cellarwatch_crawler::{sitemap, CrawlDiffer};
use cellarwatch_infra::{db, store::PostgresStore};

/// Nothing saved, something failed.
const EXIT_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let config = CrawlConfig::load().unwrap_or_else(|e| e.exit());
    cellarwatch_observability::init("cellarwatch-crawl");

    match run(config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "crawl aborted");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn run(config: CrawlConfig) -> anyhow::Result<u8> {
    let pool = db::connect(&config.database_url, 2)
        .await
        .context("database connection failed")?;
    db::migrate(&pool).await.context("database migration failed")?;
    let store = Arc::new(PostgresStore::new(pool));

    let fetcher = Arc::new(
        HttpFetcher::new(&config.user_agent, config.http_timeout())
            .context("failed to build HTTP client")?,
    );

    let entries = sitemap::fetch_entries(
        fetcher.as_ref(),
        &config.sitemap_index_url,
        config.request_delay(),
    )
    .await
    .with_context(|| format!("sitemap discovery failed for {}", config.sitemap_index_url))?;
    info!(entries = entries.len(), "sitemap loaded");

    let differ = CrawlDiffer::new(fetcher, Arc::new(JsonLdParser), store, config.settings());
    let report = differ
        .run(&entries)
        .await
        .context("could not load catalog snapshot")?;

    report.log_summary();
    Ok(report.exit_code())
}

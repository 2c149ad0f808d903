//! Crawl run configuration (environment + CLI flags).

use std::time::Duration;

use clap::Parser;

use crate::differ::CrawlSettings;

pub const DEFAULT_SITEMAP_INDEX_URL: &str =
    "https://www.saq.com/media/sitemaps/fr/sitemap_product.xml";
pub const DEFAULT_USER_AGENT: &str =
    "SAQSommelier/0.1.0 (personal project; https://github.com/vpatrin/saq-sommelier)";

/// One incremental crawl of the product catalog.
#[derive(Debug, Clone, Parser)]
#[command(name = "cellarwatch-crawl", about = "Incremental catalog crawl", long_about = None)]
pub struct CrawlConfig {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    #[arg(long, env = "SITEMAP_INDEX_URL", default_value = DEFAULT_SITEMAP_INDEX_URL)]
    pub sitemap_index_url: String,

    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Delay between consecutive requests, in milliseconds.
    #[arg(long, env = "REQUEST_DELAY_MS", default_value_t = 2000)]
    pub request_delay_ms: u64,

    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Stop after fetching this many product pages.
    #[arg(long)]
    pub max_products: Option<usize>,
}

impl CrawlConfig {
    /// Load `.env` (if present), then parse flags and environment.
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();
        Self::try_parse()
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn settings(&self) -> CrawlSettings {
        CrawlSettings {
            request_delay: self.request_delay(),
            max_products: self.max_products,
        }
    }
}

//! Sitemap discovery.
//!
//! The catalog publishes a sitemap index (`<sitemapindex><sitemap><loc>`)
//! pointing at product sub-sitemaps (`<urlset><url><loc>` + optional
//! `<lastmod>`). Only entries whose last path segment is a numeric SKU are
//! catalog products; the same sitemaps also list recipes and accessories.

use std::collections::HashSet;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};

use cellarwatch_core::Sku;

use crate::fetcher::{FetchError, PageFetcher};

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("sitemap fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("sitemap index {0} lists no sub-sitemaps")]
    EmptyIndex(String),
}

/// One product URL from a sub-sitemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub url: String,
    pub sku: Sku,
    /// Raw `<lastmod>` text, date or RFC 3339 datetime.
    pub lastmod: Option<String>,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn child_text(element: ElementRef<'_>, child: &Selector) -> Option<String> {
    element
        .select(child)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Sub-sitemap URLs listed by a sitemap index document.
pub fn parse_sitemap_index(xml: &str) -> Vec<String> {
    sitemap_locations(xml).unwrap_or_default()
}

fn sitemap_locations(xml: &str) -> Option<Vec<String>> {
    let doc = Html::parse_document(xml);
    let sitemap = selector("sitemap")?;
    let loc = selector("loc")?;

    Some(
        doc.select(&sitemap)
            .filter_map(|el| child_text(el, &loc))
            .collect(),
    )
}

/// Catalog product entries of one sub-sitemap.
pub fn parse_sub_sitemap(xml: &str) -> Vec<SitemapEntry> {
    product_entries(xml).unwrap_or_default()
}

fn product_entries(xml: &str) -> Option<Vec<SitemapEntry>> {
    let doc = Html::parse_document(xml);
    let url = selector("url")?;
    let loc = selector("loc")?;
    let lastmod = selector("lastmod")?;

    let entries = doc
        .select(&url)
        .filter_map(|el| {
            let href = child_text(el, &loc)?;
            let sku = Sku::from_product_url(&href).ok()?;
            if !sku.is_catalog_product() {
                return None;
            }
            Some(SitemapEntry {
                url: href,
                sku,
                lastmod: child_text(el, &lastmod),
            })
        })
        .collect();
    Some(entries)
}

/// Fetch the index and every sub-sitemap it lists, pausing `delay` between
/// requests. Duplicate SKUs keep their first entry.
///
/// A sub-sitemap that fails to download aborts discovery: a partial snapshot
/// would make reconciliation delist everything it is missing.
pub async fn fetch_entries(
    fetcher: &dyn PageFetcher,
    index_url: &str,
    delay: Duration,
) -> Result<Vec<SitemapEntry>, SitemapError> {
    let index = fetcher.fetch(index_url).await?;
    let sub_sitemaps = parse_sitemap_index(&index);
    if sub_sitemaps.is_empty() {
        return Err(SitemapError::EmptyIndex(index_url.to_string()));
    }
    info!(count = sub_sitemaps.len(), "fetched sitemap index");

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for url in &sub_sitemaps {
        tokio::time::sleep(delay).await;
        let body = fetcher.fetch(url).await?;
        let parsed = parse_sub_sitemap(&body);
        debug!(sub_sitemap = %url, entries = parsed.len(), "parsed sub-sitemap");

        for entry in parsed {
            if seen.insert(entry.sku.clone()) {
                entries.push(entry);
            } else {
                warn!(sku = %entry.sku, url = %entry.url, "duplicate SKU in sitemap, keeping first");
            }
        }
    }

    Ok(entries)
}

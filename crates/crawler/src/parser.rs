//! Product page parsing.
//!
//! Product pages embed a schema.org `Product` block as JSON-LD. Only the first
//! such block is read; everything the pipeline needs (name, sku, price,
//! currency, availability) lives there.

use html_escape::decode_html_entities;
use scraper::{Html, Selector};
use serde_json::Value;
use thiserror::Error;

use cellarwatch_core::{ProductRecord, Sku};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON-LD Product block in {0}")]
    MissingProduct(String),

    #[error("no usable SKU for {url}: {reason}")]
    InvalidSku { url: String, reason: String },
}

/// Turns a fetched page into a product record.
pub trait ProductParser: Send + Sync {
    fn parse(&self, html: &str, url: &str) -> Result<ProductRecord, ParseError>;
}

/// Parser for the JSON-LD `Product` block.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLdParser;

impl ProductParser for JsonLdParser {
    fn parse(&self, html: &str, url: &str) -> Result<ProductRecord, ParseError> {
        let product = find_product_block(html)
            .ok_or_else(|| ParseError::MissingProduct(url.to_string()))?;

        let sku = match string_field(&product, "sku") {
            Some(raw) => Sku::parse(raw),
            None => Sku::from_product_url(url),
        }
        .map_err(|e| ParseError::InvalidSku {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let offers = product.get("offers").filter(|o| o.is_object());
        let price = offers.and_then(|o| o.get("price")).and_then(number_field);
        let currency = offers
            .and_then(|o| o.get("priceCurrency"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let availability = offers.map(|o| {
            o.get("availability")
                .map(|a| match a {
                    Value::String(s) => s.contains("InStock"),
                    other => other.to_string().contains("InStock"),
                })
                .unwrap_or(false)
        });

        Ok(ProductRecord {
            sku,
            url: url.to_string(),
            name: string_field(&product, "name").map(|n| decode_html_entities(&n).into_owned()),
            price,
            currency,
            availability,
        })
    }
}

fn find_product_block(html: &str) -> Option<Value> {
    let doc = Html::parse_document(html);
    let scripts = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    doc.select(&scripts)
        .filter_map(|el| serde_json::from_str::<Value>(&el.text().collect::<String>()).ok())
        .flat_map(|value| match value {
            Value::Array(items) => items,
            other => vec![other],
        })
        .find(|value| value.get("@type").and_then(Value::as_str) == Some("Product"))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Prices show up both as JSON numbers and as strings.
fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

//! Recipient routing and message text.

use cellarwatch_core::PendingNotification;

/// Extract a chat id from a watcher id such as `tg:123456`.
///
/// Anything else (other prefixes, missing or non-numeric id) is unroutable.
pub fn parse_recipient(user_id: &str, prefix: &str) -> Option<i64> {
    let (head, raw_id) = user_id.split_once(':')?;
    if head != prefix || raw_id.is_empty() || !raw_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw_id.parse().ok()
}

/// Markdown restock alert; the SKU stands in for a missing product name.
pub fn render_restock(item: &PendingNotification, product_base_url: &str) -> String {
    let name = item
        .product_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(item.sku.as_str());
    format!(
        "\u{1f377} Back in stock: [{name}]({}/{})",
        product_base_url.trim_end_matches('/'),
        item.sku
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellarwatch_core::{RestockEventId, Sku};
    use chrono::Utc;

    fn item(name: Option<&str>) -> PendingNotification {
        PendingNotification {
            event_id: RestockEventId::new(1),
            sku: Sku::parse("10327701").unwrap(),
            user_id: "tg:1".to_string(),
            product_name: name.map(str::to_string),
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn recipients_need_prefix_and_numeric_id() {
        assert_eq!(parse_recipient("tg:123456", "tg"), Some(123456));
        assert_eq!(parse_recipient("tg:", "tg"), None);
        assert_eq!(parse_recipient("tg:12a", "tg"), None);
        assert_eq!(parse_recipient("tg:-5", "tg"), None);
        assert_eq!(parse_recipient("mail:123", "tg"), None);
        assert_eq!(parse_recipient("123", "tg"), None);
        assert_eq!(parse_recipient("tg:99999999999999999999", "tg"), None);
    }

    #[test]
    fn renders_name_or_sku() {
        assert_eq!(
            render_restock(&item(Some("Château Test")), "https://www.saq.com/fr/"),
            "\u{1f377} Back in stock: [Château Test](https://www.saq.com/fr/10327701)"
        );
        assert_eq!(
            render_restock(&item(None), "https://www.saq.com/fr"),
            "\u{1f377} Back in stock: [10327701](https://www.saq.com/fr/10327701)"
        );
    }
}

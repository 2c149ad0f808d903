//! Notifier configuration (environment + CLI flags).

use std::time::Duration;

use clap::Parser;

/// Restock notification delivery loop.
#[derive(Debug, Clone, Parser)]
#[command(name = "cellarwatch-notifier", about = "Restock notification drainer", long_about = None)]
pub struct NotifierConfig {
    /// Base URL of the cellarwatch API.
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    #[arg(long, env = "BACKEND_TIMEOUT_SECS", default_value_t = 10)]
    pub backend_timeout_secs: u64,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: String,

    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// Seconds between drain cycles.
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// Watcher id prefix routed to Telegram (`tg` matches `tg:<chat id>`).
    #[arg(long, env = "RECIPIENT_PREFIX", default_value = "tg")]
    pub recipient_prefix: String,

    /// Product links in messages are `<base>/<sku>`.
    #[arg(long, env = "PRODUCT_BASE_URL", default_value = "https://www.saq.com/fr")]
    pub product_base_url: String,
}

impl NotifierConfig {
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();
        Self::try_parse()
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_required_and_defaults_fill_the_rest() {
        let cfg = NotifierConfig::try_parse_from([
            "cellarwatch-notifier",
            "--telegram-bot-token",
            "123:abc",
        ])
        .unwrap();
        assert_eq!(cfg.recipient_prefix, "tg");
        assert_eq!(cfg.backend_timeout(), Duration::from_secs(10));

        let zero = NotifierConfig::try_parse_from([
            "cellarwatch-notifier",
            "--telegram-bot-token",
            "123:abc",
            "--poll-interval-secs",
            "0",
        ])
        .unwrap();
        assert_eq!(zero.poll_interval(), Duration::from_secs(1));
    }
}

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Notify;

use cellarwatch_notifier::config::NotifierConfig;
use cellarwatch_notifier::gateway::BackendClient;
use cellarwatch_notifier::sender::TelegramSender;
use cellarwatch_notifier::Drainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NotifierConfig::load().unwrap_or_else(|e| e.exit());
    cellarwatch_observability::init("cellarwatch-notifier");

    let gateway = BackendClient::new(&config.backend_url, config.backend_timeout())
        .context("failed to build backend client")?;
    let sender = TelegramSender::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        config.backend_timeout(),
    )
    .context("failed to build Telegram client")?;

    let drainer = Drainer::new(
        Arc::new(gateway),
        Arc::new(sender),
        config.recipient_prefix.clone(),
        config.product_base_url.clone(),
    );

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.notify_one();
        }
    });

    tracing::info!(backend = %config.backend_url, "notifier running");
    drainer.run(config.poll_interval(), shutdown).await;
    Ok(())
}

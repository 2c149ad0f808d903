//! Outbound chat delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("send transport failure: {0}")]
    Transport(String),

    #[error("chat API rejected message to {chat_id}: {description}")]
    Rejected { chat_id: i64, description: String },
}

/// Delivers one text message to one chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendError>;
}

/// Telegram Bot API `sendMessage` (Markdown, link previews off).
#[derive(Debug, Clone)]
pub struct TelegramSender {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramSender {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SendError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
        })
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        // The token is part of the URL; keep reqwest errors free of it.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let parsed: TelegramResponse = response
            .json()
            .await
            .map_err(|e| SendError::Transport(e.without_url().to_string()))?;

        if !status.is_success() || !parsed.ok {
            return Err(SendError::Rejected {
                chat_id,
                description: parsed
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            });
        }
        Ok(())
    }
}

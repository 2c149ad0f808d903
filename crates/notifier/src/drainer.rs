//! Delivery drainer.
//!
//! Each cycle pulls batches from the gateway until one comes back empty. Every
//! item in a batch is acknowledged whether or not it was delivered:
//! unroutable watcher ids and failed sends are dropped instead of retried. An
//! ack failure ends the cycle so the next one re-fetches the same batch
//! rather than spinning on it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use cellarwatch_core::RestockEventId;

use crate::gateway::NotificationGateway;
use crate::render::{parse_recipient, render_restock};
use crate::sender::MessageSender;

/// Counters for one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Batches fully processed and acknowledged.
    pub batches: u64,
    pub sent: u64,
    pub send_failures: u64,
    pub unroutable: u64,
    pub acked: u64,
    /// The cycle stopped on a fetch or ack failure.
    pub interrupted: bool,
}

pub struct Drainer {
    gateway: Arc<dyn NotificationGateway>,
    sender: Arc<dyn MessageSender>,
    recipient_prefix: String,
    product_base_url: String,
}

impl Drainer {
    pub fn new(
        gateway: Arc<dyn NotificationGateway>,
        sender: Arc<dyn MessageSender>,
        recipient_prefix: impl Into<String>,
        product_base_url: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            sender,
            recipient_prefix: recipient_prefix.into(),
            product_base_url: product_base_url.into(),
        }
    }

    /// Drain until the gateway has nothing pending or a request fails.
    pub async fn drain_cycle(&self) -> DrainStats {
        let mut stats = DrainStats::default();

        loop {
            let batch = match self.gateway.fetch_pending().await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "notification poll skipped; backend unavailable");
                    stats.interrupted = true;
                    break;
                }
            };
            if batch.is_empty() {
                break;
            }

            let mut seen = HashSet::new();
            let mut to_ack: Vec<RestockEventId> = Vec::with_capacity(batch.len());

            for item in &batch {
                match parse_recipient(&item.user_id, &self.recipient_prefix) {
                    None => {
                        warn!(user_id = %item.user_id, event_id = %item.event_id, "unroutable watcher id; acking without send");
                        stats.unroutable += 1;
                    }
                    Some(chat_id) => {
                        let text = render_restock(item, &self.product_base_url);
                        match self.sender.send(chat_id, &text).await {
                            Ok(()) => {
                                debug!(chat_id, sku = %item.sku, "restock notification sent");
                                stats.sent += 1;
                            }
                            Err(e) => {
                                warn!(chat_id, error = %e, "failed to send notification");
                                stats.send_failures += 1;
                            }
                        }
                    }
                }
                if seen.insert(item.event_id) {
                    to_ack.push(item.event_id);
                }
            }

            if let Err(e) = self.gateway.ack(&to_ack).await {
                warn!(count = to_ack.len(), error = %e, "failed to ack events; will retry next poll");
                stats.interrupted = true;
                break;
            }
            info!(count = to_ack.len(), "acked events");
            stats.acked += to_ack.len() as u64;
            stats.batches += 1;
        }

        if stats.batches > 0 {
            info!(batches = stats.batches, "notification poll complete");
        }
        stats
    }

    /// Run a cycle every `interval` until `shutdown` is notified.
    ///
    /// Cycles never overlap: a cycle that outlasts the interval delays the
    /// next tick instead of queueing extra ones.
    pub async fn run(&self, interval: Duration, shutdown: Arc<Notify>) {
        info!(interval_secs = interval.as_secs(), "drainer started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("drainer received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.drain_cycle().await;
                }
            }
        }
    }
}

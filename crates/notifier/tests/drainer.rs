use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use cellarwatch_core::{PendingNotification, ProductRecord, RestockEventId, Sku, WatcherId};
use cellarwatch_notifier::gateway::{BackendClient, GatewayError, NotificationGateway};
use cellarwatch_notifier::sender::{MessageSender, SendError};
use cellarwatch_notifier::Drainer;

const BASE: &str = "https://www.saq.com/fr";

fn item(event: i64, user: &str) -> PendingNotification {
    PendingNotification {
        event_id: RestockEventId::new(event),
        sku: Sku::parse(format!("{}", 1000 + event)).unwrap(),
        user_id: user.to_string(),
        product_name: Some(format!("Wine {event}")),
        detected_at: Utc::now(),
    }
}

/// Behaves like the API: serves the oldest pending rows, acks remove them.
#[derive(Default)]
struct FakeGateway {
    pending: Mutex<Vec<PendingNotification>>,
    batch_size: usize,
    fetches: Mutex<u32>,
    acks: Mutex<Vec<Vec<RestockEventId>>>,
    failing_acks: Mutex<u32>,
    fetch_down: Mutex<bool>,
}

impl FakeGateway {
    fn with(items: Vec<PendingNotification>, batch_size: usize) -> Self {
        Self {
            pending: Mutex::new(items),
            batch_size,
            ..Self::default()
        }
    }

    fn fetches(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }

    fn acks(&self) -> Vec<Vec<RestockEventId>> {
        self.acks.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for FakeGateway {
    async fn fetch_pending(&self) -> Result<Vec<PendingNotification>, GatewayError> {
        *self.fetches.lock().unwrap() += 1;
        if *self.fetch_down.lock().unwrap() {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        let pending = self.pending.lock().unwrap();
        Ok(pending.iter().take(self.batch_size).cloned().collect())
    }

    async fn ack(&self, event_ids: &[RestockEventId]) -> Result<(), GatewayError> {
        {
            let mut failing = self.failing_acks.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(GatewayError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
        }
        self.acks.lock().unwrap().push(event_ids.to_vec());
        self.pending
            .lock()
            .unwrap()
            .retain(|p| !event_ids.contains(&p.event_id));
        Ok(())
    }
}

/// Records deliveries; chat ids in `reject` fail.
#[derive(Default)]
struct FakeSender {
    sent: Mutex<Vec<(i64, String)>>,
    reject: Vec<i64>,
}

impl FakeSender {
    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        if self.reject.contains(&chat_id) {
            return Err(SendError::Rejected {
                chat_id,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

fn drainer(gateway: Arc<FakeGateway>, sender: Arc<FakeSender>) -> Drainer {
    Drainer::new(gateway, sender, "tg", BASE)
}

#[tokio::test]
async fn unroutable_recipients_are_acked_without_sending() {
    let gateway = Arc::new(FakeGateway::with(
        vec![item(1, "email:someone"), item(2, "tg:42"), item(3, "tg:not-a-number")],
        10,
    ));
    let sender = Arc::new(FakeSender::default());

    let stats = drainer(gateway.clone(), sender.clone()).drain_cycle().await;

    assert_eq!(stats.unroutable, 2);
    assert_eq!(stats.sent, 1);
    assert_eq!(sender.sent().len(), 1);
    assert_eq!(sender.sent()[0].0, 42);
    assert_eq!(
        sender.sent()[0].1,
        "\u{1f377} Back in stock: [Wine 2](https://www.saq.com/fr/1002)"
    );
    assert_eq!(
        gateway.acks(),
        vec![vec![
            RestockEventId::new(1),
            RestockEventId::new(2),
            RestockEventId::new(3)
        ]]
    );
}

#[tokio::test]
async fn failed_sends_are_still_acked() {
    let gateway = Arc::new(FakeGateway::with(vec![item(1, "tg:7"), item(2, "tg:8")], 10));
    let sender = Arc::new(FakeSender {
        reject: vec![7],
        ..FakeSender::default()
    });

    let stats = drainer(gateway.clone(), sender.clone()).drain_cycle().await;

    assert_eq!(stats.send_failures, 1);
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.acked, 2);
    assert!(gateway.pending.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ack_failure_stops_cycle_and_next_cycle_refetches() {
    let gateway = Arc::new(FakeGateway::with(
        vec![item(1, "tg:1"), item(2, "tg:1"), item(3, "tg:1")],
        2,
    ));
    *gateway.failing_acks.lock().unwrap() = 1;
    let sender = Arc::new(FakeSender::default());
    let drainer = drainer(gateway.clone(), sender.clone());

    let first = drainer.drain_cycle().await;
    assert!(first.interrupted);
    assert_eq!(first.batches, 0);
    assert_eq!(gateway.fetches(), 1);
    assert!(gateway.acks().is_empty());

    let second = drainer.drain_cycle().await;
    assert!(!second.interrupted);
    assert_eq!(second.batches, 2);
    // Batch 1 was re-fetched: events 1 and 2 were delivered twice overall.
    assert_eq!(sender.sent().len(), 5);
    assert_eq!(
        gateway.acks()[0],
        vec![RestockEventId::new(1), RestockEventId::new(2)]
    );
}

#[tokio::test]
async fn drains_batches_until_empty() {
    let items = (1..=5).map(|i| item(i, &format!("tg:{i}"))).collect();
    let gateway = Arc::new(FakeGateway::with(items, 2));
    let sender = Arc::new(FakeSender::default());

    let stats = drainer(gateway.clone(), sender.clone()).drain_cycle().await;

    assert_eq!(stats.batches, 3);
    assert_eq!(stats.acked, 5);
    // 3 non-empty batches + the empty one that ends the cycle.
    assert_eq!(gateway.fetches(), 4);
}

#[tokio::test]
async fn fetch_failure_ends_cycle() {
    let gateway = Arc::new(FakeGateway::with(vec![item(1, "tg:1")], 10));
    *gateway.fetch_down.lock().unwrap() = true;
    let sender = Arc::new(FakeSender::default());

    let stats = drainer(gateway.clone(), sender.clone()).drain_cycle().await;

    assert!(stats.interrupted);
    assert_eq!(gateway.fetches(), 1);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn event_with_many_watchers_is_acked_once() {
    let gateway = Arc::new(FakeGateway::with(
        vec![item(1, "tg:1"), item(1, "tg:2"), item(1, "tg:3")],
        10,
    ));
    let sender = Arc::new(FakeSender::default());

    let stats = drainer(gateway.clone(), sender.clone()).drain_cycle().await;

    assert_eq!(stats.sent, 3);
    assert_eq!(gateway.acks(), vec![vec![RestockEventId::new(1)]]);
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let gateway = Arc::new(FakeGateway::with(vec![item(1, "tg:1")], 10));
    let sender = Arc::new(FakeSender::default());
    let drainer = drainer(gateway.clone(), sender.clone());
    let shutdown = Arc::new(Notify::new());

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.notify_one();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        drainer.run(Duration::from_millis(10), shutdown),
    )
    .await
    .expect("drainer did not stop");

    assert_eq!(sender.sent().len(), 1);
    assert!(gateway.fetches() >= 2);
}

// ---------------------------------------------------------------------------
// End-to-end against the in-process API
// ---------------------------------------------------------------------------

mod end_to_end {
    use super::*;
    use cellarwatch_api::app::{build_app, AppServices, BatchLimits};
    use cellarwatch_infra::store::{CatalogStore, InMemoryStore, RestockEventStore, WatchStore};

    async fn spawn_api(store: Arc<InMemoryStore>, limits: BatchLimits) -> (String, tokio::task::JoinHandle<()>) {
        let app = build_app(AppServices::from_store(store, limits));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), handle)
    }

    async fn seed(store: &InMemoryStore, sku: &str, watchers: &[&str]) {
        let record = ProductRecord {
            sku: Sku::parse(sku).unwrap(),
            url: format!("{BASE}/{sku}"),
            name: Some(format!("Cuvée {sku}")),
            price: None,
            currency: None,
            availability: Some(false),
        };
        store.save_scrape(&record, false, Utc::now()).await.unwrap();
        for w in watchers {
            store
                .create_watch(&WatcherId::parse(*w).unwrap(), &record.sku, Utc::now())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn drains_real_gateway_and_leaves_nothing_pending() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "111", &["tg:1", "tg:2", "web:3"]).await;
        seed(&store, "222", &["tg:1"]).await;
        seed(&store, "333", &[]).await;
        for sku in ["111", "222", "333"] {
            store
                .append_restock(&Sku::parse(sku).unwrap(), Utc::now())
                .await
                .unwrap();
        }

        let (base_url, handle) = spawn_api(store.clone(), BatchLimits::new(3, 3).unwrap()).await;
        let gateway = Arc::new(BackendClient::new(&base_url, Duration::from_secs(5)).unwrap());
        let sender = Arc::new(FakeSender::default());
        let drainer = Drainer::new(gateway, sender.clone(), "tg", BASE);

        let stats = drainer.drain_cycle().await;
        handle.abort();

        assert!(!stats.interrupted);
        assert_eq!(stats.sent, 3);
        assert_eq!(stats.unroutable, 1);
        assert!(sender
            .sent()
            .iter()
            .any(|(chat, text)| *chat == 2 && text.contains("[Cuvée 111](https://www.saq.com/fr/111)")));
        assert!(store.find_pending_notifications(10).await.unwrap().is_empty());

        // The unwatched event is never surfaced, so it stays pending in storage.
        let events = store.events().unwrap();
        let unwatched = events.iter().find(|e| e.sku.as_str() == "333").unwrap();
        assert!(unwatched.processed_at.is_none());
        assert!(events
            .iter()
            .filter(|e| e.sku.as_str() != "333")
            .all(|e| e.processed_at.is_some()));
    }
}

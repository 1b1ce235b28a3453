//! Integration tests for the deduplicating broker over loopback TCP.
//!
//! Each test binds its own port pair so they can run in parallel.

use std::time::Duration;

use tokio::time::timeout;

use warden_bus::{
    BrokerConfig, BrokerShutdown, EventBroker, EventPublisher, EventSubscriber, Message,
    Transport, ZmqPublisher, ZmqSubscriber, ACTIONS_TOPIC,
};

const TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(200);
const QUIET: Duration = Duration::from_millis(400);

struct Harness {
    publisher: ZmqPublisher,
    subscriber: ZmqSubscriber,
    stop: BrokerShutdown,
    metrics: std::sync::Arc<warden_bus::BrokerMetrics>,
    handle: tokio::task::JoinHandle<Result<(), warden_bus::BusError>>,
}

async fn start(port: u16, window: Duration) -> Harness {
    let config = BrokerConfig {
        frontend: Transport::loopback(port),
        backend: Transport::loopback(port + 1),
        window,
    };
    let broker = EventBroker::bind(config).await.unwrap();
    let stop = broker.shutdown_handle();
    let metrics = broker.metrics();
    let handle = tokio::spawn(broker.run());

    let subscriber = ZmqSubscriber::connect(&Transport::loopback(port + 1))
        .await
        .unwrap();
    subscriber.subscribe(ACTIONS_TOPIC).await.unwrap();
    let publisher = ZmqPublisher::connect(&Transport::loopback(port)).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    Harness {
        publisher,
        subscriber,
        stop,
        metrics,
        handle,
    }
}

impl Harness {
    async fn publish(&self, key: Option<&str>, body: &str) {
        let mut msg = Message::new(ACTIONS_TOPIC, &body).unwrap();
        if let Some(key) = key {
            msg = msg.with_dedup_key(key);
        }
        self.publisher.publish(msg).await.unwrap();
    }

    async fn expect(&self) -> String {
        timeout(TIMEOUT, self.subscriber.recv())
            .await
            .expect("timed out waiting for delivery")
            .unwrap()
            .decode()
            .unwrap()
    }

    async fn expect_nothing(&self) {
        let extra = timeout(QUIET, self.subscriber.recv()).await;
        assert!(extra.is_err(), "unexpected extra delivery");
    }

    async fn stop(self) {
        self.stop.shutdown();
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn same_key_within_window_is_delivered_once() {
    let h = start(16100, Duration::from_secs(10)).await;

    h.publish(Some("pod-a|R1|A1|id1"), "first").await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.publish(Some("pod-a|R1|A1|id1"), "second").await;

    assert_eq!(h.expect().await, "first");
    h.expect_nothing().await;

    let stats = h.metrics.snapshot();
    assert_eq!(stats.messages_received, 2);
    assert_eq!(stats.duplicates_dropped, 1);
    assert_eq!(stats.messages_delivered, 1);
    h.stop().await;
}

#[tokio::test]
async fn same_key_after_window_is_delivered_again() {
    let h = start(16110, Duration::from_millis(500)).await;

    h.publish(Some("pod-a|R1|A1|id1"), "first").await;
    assert_eq!(h.expect().await, "first");

    tokio::time::sleep(Duration::from_millis(800)).await;
    h.publish(Some("pod-a|R1|A1|id1"), "second").await;
    assert_eq!(h.expect().await, "second");
    h.stop().await;
}

#[tokio::test]
async fn distinct_keys_are_all_delivered() {
    let h = start(16120, Duration::from_secs(10)).await;

    h.publish(Some("pod-a|R1|A1|id1"), "a1").await;
    h.publish(Some("pod-a|R1|A2|id1"), "a2").await;
    h.publish(Some("pod-b|R1|A1|id1"), "b1").await;

    let mut got = vec![h.expect().await, h.expect().await, h.expect().await];
    got.sort();
    assert_eq!(got, vec!["a1", "a2", "b1"]);
    h.stop().await;
}

#[tokio::test]
async fn messages_without_key_bypass_dedup() {
    let h = start(16130, Duration::from_secs(10)).await;

    h.publish(None, "x").await;
    h.publish(None, "x").await;

    assert_eq!(h.expect().await, "x");
    assert_eq!(h.expect().await, "x");
    h.stop().await;
}

#[tokio::test]
async fn publishers_from_several_replicas_share_one_window() {
    let h = start(16140, Duration::from_secs(10)).await;
    let other_replica = ZmqPublisher::connect(&Transport::loopback(16140))
        .await
        .unwrap();
    tokio::time::sleep(SETTLE).await;

    h.publish(Some("pod-a|R1|A1|id1"), "replica-1").await;
    other_replica
        .publish(
            Message::new(ACTIONS_TOPIC, &"replica-2")
                .unwrap()
                .with_dedup_key("pod-a|R1|A1|id1"),
        )
        .await
        .unwrap();

    h.expect().await;
    h.expect_nothing().await;
    h.stop().await;
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::dedup::DedupWindow;
use crate::error::BusError;
use crate::message::Message;
use crate::transport::Transport;

/// How often the proxy loop wakes to check for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Counters maintained by the proxy loop.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    received: AtomicU64,
    duplicates: AtomicU64,
    delivered: AtomicU64,
    malformed: AtomicU64,
}

/// Point-in-time copy of [`BrokerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    pub messages_received: u64,
    pub duplicates_dropped: u64,
    pub messages_delivered: u64,
    pub malformed_dropped: u64,
}

impl BrokerMetrics {
    pub fn snapshot(&self) -> BrokerStats {
        BrokerStats {
            messages_received: self.received.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates.load(Ordering::Relaxed),
            messages_delivered: self.delivered.load(Ordering::Relaxed),
            malformed_dropped: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Configuration for the deduplicating broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Where publishers connect (broker binds SUB here).
    pub frontend: Transport,
    /// Where the consumer connects (broker binds PUB here).
    pub backend: Transport,
    /// Dedup window W.
    pub window: Duration,
}

impl BrokerConfig {
    /// Frontend on every interface so followers can reach it; delivery on loopback only.
    pub fn replica(port: u16, delivery_port: u16, window: Duration) -> Self {
        Self {
            frontend: Transport::any(port),
            backend: Transport::loopback(delivery_port),
            window,
        }
    }
}

/// Cloneable handle that stops a running broker.
#[derive(Debug, Clone)]
pub struct BrokerShutdown(Arc<AtomicBool>);

impl BrokerShutdown {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Replica-local publish/subscribe proxy with windowed deduplication.
///
/// - Publishers connect to the **frontend** (SUB socket the broker binds,
///   subscribed to every topic).
/// - The consumer connects to the **backend** (PUB socket the broker binds).
/// - Each message whose `dedup_key` was already seen within the window is
///   dropped; every other message is forwarded unchanged.
///
/// `zeromq` 0.4 has no XPUB/XSUB, so the proxy is emulated with SUB+PUB.
pub struct EventBroker {
    config: BrokerConfig,
    frontend: SubSocket,
    backend: PubSocket,
    dedup: DedupWindow,
    metrics: Arc<BrokerMetrics>,
    shutdown: Arc<AtomicBool>,
}

impl EventBroker {
    /// Bind both sockets. Failure here is fatal for the replica.
    pub async fn bind(config: BrokerConfig) -> Result<Self, BusError> {
        let mut frontend = SubSocket::new();
        frontend.bind(&config.frontend.endpoint()).await?;
        frontend.subscribe("").await?;
        tracing::info!(
            endpoint = %config.frontend,
            "broker frontend (SUB) bound, publishers connect here"
        );

        let mut backend = PubSocket::new();
        backend.bind(&config.backend.endpoint()).await?;
        tracing::info!(
            endpoint = %config.backend,
            "broker backend (PUB) bound, consumer connects here"
        );

        Ok(Self {
            dedup: DedupWindow::new(config.window),
            config,
            frontend,
            backend,
            metrics: Arc::new(BrokerMetrics::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<BrokerMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn shutdown_handle(&self) -> BrokerShutdown {
        BrokerShutdown(Arc::clone(&self.shutdown))
    }

    /// Run the proxy loop until shutdown is signaled.
    pub async fn run(mut self) -> Result<(), BusError> {
        tracing::info!(window = ?self.config.window, "broker proxy loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("broker shutting down");
                break;
            }

            let msg = match tokio::time::timeout(POLL_INTERVAL, self.frontend.recv()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "frontend recv error");
                    continue;
                }
                Err(_) => continue,
            };
            self.metrics.received.fetch_add(1, Ordering::Relaxed);

            let key = match decode_envelope(&msg) {
                Some(envelope) => envelope.dedup_key,
                None => {
                    self.metrics.malformed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        frames = msg.iter().count(),
                        "dropping message without a valid envelope"
                    );
                    continue;
                }
            };

            if let Some(key) = &key {
                if !self.dedup.admit(key, Instant::now()) {
                    self.metrics.duplicates.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, "duplicate within window, dropped");
                    continue;
                }
            }

            match self.backend.send(msg).await {
                Ok(()) => {
                    self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = key.as_deref().unwrap_or(""), "message forwarded");
                }
                Err(e) => tracing::warn!(error = %e, "backend send error"),
            }
        }

        let stats = self.metrics.snapshot();
        tracing::info!(
            received = stats.messages_received,
            duplicates = stats.duplicates_dropped,
            delivered = stats.messages_delivered,
            "broker stopped"
        );
        Ok(())
    }
}

/// Decode the [`Message`] from a two-frame `[topic, envelope]` ZMQ message.
fn decode_envelope(msg: &ZmqMessage) -> Option<Message> {
    let frames: Vec<_> = msg.iter().collect();
    let bytes: &[u8] = match frames.as_slice() {
        [_, envelope, ..] => envelope.as_ref(),
        [single] => single.as_ref(),
        [] => return None,
    };
    Message::from_bytes(bytes).ok()
}

//! Fan-out of outcome lines to every enabled sink.
//!
//! Submitting never blocks the dispatch path: lines go into a bounded channel
//! and a single drain task hands each one to all sinks concurrently, each
//! call under its own timeout. A full channel drops the line with a warning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use warden_core::{ClusterClient, Config, LogLine};

use crate::k8sevents::K8sEventsSink;
use crate::log::LogSink;
use crate::traits::{ResultSink, SinkError};
use crate::webhook::WebhookSink;

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Producer half, cheap to clone.
#[derive(Clone)]
pub struct SinkFanout {
    tx: mpsc::Sender<LogLine>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half; runs until every [`SinkFanout`] clone is dropped.
pub struct SinkDrain {
    rx: mpsc::Receiver<LogLine>,
    sinks: Vec<Arc<dyn ResultSink>>,
    timeout: Duration,
}

impl SinkFanout {
    pub fn new(
        sinks: Vec<Arc<dyn ResultSink>>,
        capacity: usize,
        timeout: Duration,
    ) -> (Self, SinkDrain) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            SinkDrain { rx, sinks, timeout },
        )
    }

    /// Build both halves and spawn the drain task.
    pub fn spawn(
        sinks: Vec<Arc<dyn ResultSink>>,
        capacity: usize,
        timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (fanout, drain) = Self::new(sinks, capacity, timeout);
        (fanout, tokio::spawn(drain.run()))
    }

    /// Queue `line` for delivery. Returns false if it was dropped.
    pub fn submit(&self, line: LogLine) -> bool {
        match self.tx.try_send(line) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(line)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    rule = %line.rule,
                    action = %line.action,
                    trace_id = %line.trace_id,
                    "result sink queue full, dropping line"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(line)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(trace_id = %line.trace_id, "result sink drain stopped, dropping line");
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SinkDrain {
    pub async fn run(mut self) {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        tracing::info!(sinks = ?names, "result sinks started");

        while let Some(line) = self.rx.recv().await {
            let deliveries = self
                .sinks
                .iter()
                .map(|sink| deliver(sink.as_ref(), &line, self.timeout));
            join_all(deliveries).await;
        }

        tracing::debug!("result sink drain finished");
    }
}

async fn deliver(sink: &dyn ResultSink, line: &LogLine, timeout: Duration) {
    let start = Instant::now();
    match tokio::time::timeout(timeout, sink.send(line)).await {
        Ok(Ok(())) => {
            tracing::trace!(
                sink = sink.name(),
                duration_ms = start.elapsed().as_millis() as u64,
                "line delivered"
            );
        }
        Ok(Err(e)) => {
            tracing::warn!(sink = sink.name(), trace_id = %line.trace_id, error = %e, "result sink failed");
        }
        Err(_) => {
            tracing::warn!(
                sink = sink.name(),
                trace_id = %line.trace_id,
                timeout_ms = timeout.as_millis() as u64,
                "result sink timed out"
            );
        }
    }
}

/// The log sink plus every sink named in `default_notifiers`.
pub fn build_sinks(
    config: &Config,
    client: Arc<dyn ClusterClient>,
) -> Result<Vec<Arc<dyn ResultSink>>, SinkError> {
    let mut sinks: Vec<Arc<dyn ResultSink>> = vec![Arc::new(LogSink)];

    for name in &config.default_notifiers {
        let sink: Arc<dyn ResultSink> = match name.as_str() {
            // always on
            "log" => continue,
            "k8sevents" => Arc::new(K8sEventsSink::new(client.clone())),
            "webhook" => {
                let webhook = &config.notifiers.webhook;
                let url = webhook.url.as_deref().ok_or_else(|| {
                    SinkError::Config("webhook notifier enabled without notifiers.webhook.url".into())
                })?;
                Arc::new(WebhookSink::new(url, &webhook.headers)?)
            }
            other => return Err(SinkError::Config(format!("unknown notifier '{other}'"))),
        };
        if sinks.iter().any(|s| s.name() == sink.name()) {
            continue;
        }
        sinks.push(sink);
    }

    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use warden_core::{ClusterError, ClusterEvent, Event};

    struct CountingSink {
        name: &'static str,
        count: Arc<AtomicUsize>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl ResultSink for CountingSink {
        async fn send(&self, _line: &LogLine) -> Result<(), SinkError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SinkError::Config("mock failure".into()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn sink(name: &'static str, fail: bool, delay: Option<Duration>) -> (Arc<dyn ResultSink>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(CountingSink {
            name,
            count: count.clone(),
            fail,
            delay,
        });
        (sink, count)
    }

    fn line() -> LogLine {
        let event = Event::from_json(br#"{"priority":"Critical","rule":"shell","hostname":"node-1"}"#)
            .unwrap();
        LogLine::success(&event, "R1", "A1", "id1")
    }

    struct NoCluster;

    #[async_trait::async_trait]
    impl ClusterClient for NoCluster {
        async fn patch_pod_labels(
            &self,
            _: &str,
            _: &str,
            _: &BTreeMap<String, Option<String>>,
        ) -> Result<(), ClusterError> {
            Ok(())
        }
        async fn delete_pod(&self, _: &str, _: &str, _: Option<u32>) -> Result<(), ClusterError> {
            Ok(())
        }
        async fn namespace_exists(&self, _: &str) -> Result<bool, ClusterError> {
            Ok(false)
        }
        async fn create_event(&self, _: &ClusterEvent) -> Result<(), ClusterError> {
            Ok(())
        }
        async fn lease_holder(&self, _: &str, _: &str) -> Result<Option<String>, ClusterError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let (failing, failing_count) = sink("failing", true, None);
        let (ok, ok_count) = sink("ok", false, None);
        let (fanout, handle) = SinkFanout::spawn(vec![failing, ok], 8, Duration::from_secs(1));

        assert!(fanout.submit(line()));
        assert!(fanout.submit(line()));
        drop(fanout);
        handle.await.unwrap();

        assert_eq!(failing_count.load(Ordering::SeqCst), 2);
        assert_eq!(ok_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_sink_is_cut_off() {
        let (slow, slow_count) = sink("slow", false, Some(Duration::from_secs(30)));
        let (fast, fast_count) = sink("fast", false, None);
        let (fanout, handle) = SinkFanout::spawn(vec![slow, fast], 8, Duration::from_millis(50));

        let start = Instant::now();
        fanout.submit(line());
        drop(fanout);
        handle.await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(slow_count.load(Ordering::SeqCst), 0);
        assert_eq!(fast_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn full_queue_drops_lines() {
        let (ok, _) = sink("ok", false, None);
        let (fanout, _drain) = SinkFanout::new(vec![ok], 2, Duration::from_secs(1));

        assert!(fanout.submit(line()));
        assert!(fanout.submit(line()));
        assert!(!fanout.submit(line()));
        assert_eq!(fanout.dropped(), 1);
    }

    #[test]
    fn build_sinks_always_includes_log() {
        let config = Config::default();
        let sinks = build_sinks(&config, Arc::new(NoCluster)).unwrap();
        let names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["log"]);
    }

    #[test]
    fn build_sinks_maps_names() {
        let mut config = Config::default();
        config.default_notifiers = vec!["k8sevents".into(), "log".into(), "k8sevents".into()];
        let sinks = build_sinks(&config, Arc::new(NoCluster)).unwrap();
        let names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["log", "k8sevents"]);
    }

    #[test]
    fn build_sinks_rejects_unknown_and_incomplete() {
        let mut config = Config::default();
        config.default_notifiers = vec!["pager".into()];
        assert!(matches!(
            build_sinks(&config, Arc::new(NoCluster)),
            Err(SinkError::Config(msg)) if msg.contains("pager")
        ));

        config.default_notifiers = vec!["webhook".into()];
        assert!(build_sinks(&config, Arc::new(NoCluster)).is_err());
    }
}

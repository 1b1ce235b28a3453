//! Pipeline counters exposed on `GET /metrics`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub events_received: AtomicU64,
    pub actions_matched: AtomicU64,
    pub envelopes_published: AtomicU64,
    pub publish_errors: AtomicU64,
    pub dispatched_success: AtomicU64,
    pub dispatched_failure: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PipelineStats {
    pub events_received: u64,
    pub actions_matched: u64,
    pub envelopes_published: u64,
    pub publish_errors: u64,
    pub dispatched_success: u64,
    pub dispatched_failure: u64,
}

impl PipelineMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            events_received: self.events_received.load(Ordering::Relaxed),
            actions_matched: self.actions_matched.load(Ordering::Relaxed),
            envelopes_published: self.envelopes_published.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            dispatched_success: self.dispatched_success.load(Ordering::Relaxed),
            dispatched_failure: self.dispatched_failure.load(Ordering::Relaxed),
        }
    }
}

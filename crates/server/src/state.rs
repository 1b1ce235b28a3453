use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use warden_bus::{BrokerMetrics, EventPublisher, RoutingState};
use warden_rules::RuleStore;

use crate::metrics::PipelineMetrics;

/// Shared state for the HTTP handlers.
pub struct AppState {
    pub rules: Arc<RuleStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub metrics: Arc<PipelineMetrics>,
    pub broker: Arc<BrokerMetrics>,
    pub routing: watch::Receiver<RoutingState>,
    pub started: Instant,
}

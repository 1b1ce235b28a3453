//! Ingress side of the pipeline: match an alert and publish one envelope per
//! matched action towards the current broker.

use serde::Serialize;
use tracing::{debug, warn};
use warden_actionners::Envelope;
use warden_bus::{EventPublisher, Message, ACTIONS_TOPIC};
use warden_core::Event;
use warden_rules::RuleSet;

use crate::metrics::PipelineMetrics;

/// Result of submitting one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// Rules that matched.
    pub matched: usize,
    /// Envelopes accepted by the publisher.
    pub published: usize,
}

/// Match `event` against `rules` and publish every resulting action.
///
/// A publish error is counted and logged; remaining actions are still
/// published.
pub async fn submit(
    rules: &RuleSet,
    publisher: &dyn EventPublisher,
    metrics: &PipelineMetrics,
    event: &Event,
) -> Submission {
    PipelineMetrics::incr(&metrics.events_received);

    let matched = rules.matching(event);
    if matched.is_empty() {
        debug!(rule = %event.rule, trace_id = %event.trace_id(), "no rule matched");
        return Submission {
            matched: 0,
            published: 0,
        };
    }

    let mut published = 0;
    for rule in &matched {
        debug!(rule = %rule.name, trace_id = %event.trace_id(), "rule matched");
        for action in &rule.actions {
            PipelineMetrics::incr(&metrics.actions_matched);
            let envelope = Envelope::new(rule, action, event);
            let key = envelope.key.clone();

            let message = match Message::new(ACTIONS_TOPIC, &envelope) {
                Ok(message) => message.with_dedup_key(key),
                Err(e) => {
                    PipelineMetrics::incr(&metrics.publish_errors);
                    warn!(rule = %rule.name, action = %action.name, error = %e, "cannot encode envelope");
                    continue;
                }
            };

            match publisher.publish(message).await {
                Ok(()) => {
                    PipelineMetrics::incr(&metrics.envelopes_published);
                    published += 1;
                }
                Err(e) => {
                    PipelineMetrics::incr(&metrics.publish_errors);
                    warn!(
                        rule = %rule.name,
                        action = %action.name,
                        trace_id = %event.trace_id(),
                        error = %e,
                        "cannot publish envelope"
                    );
                }
            }
        }
    }

    Submission {
        matched: matched.len(),
        published,
    }
}

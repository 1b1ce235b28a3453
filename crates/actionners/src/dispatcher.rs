//! Runs matched actions and turns every attempt into a [`LogLine`].
//!
//! There are no retries: an error from the actionner becomes a failure line
//! and the caller moves on to the next action.

use std::sync::Arc;
use std::time::Instant;

use warden_core::{Event, LogLine};
use warden_rules::Action;

use crate::envelope::Envelope;
use crate::registry::ActionnerRegistry;
use crate::traits::ActionError;

pub struct Dispatcher {
    registry: Arc<ActionnerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ActionnerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ActionnerRegistry> {
        &self.registry
    }

    /// Execute `action` for `event`. Always yields exactly one line.
    pub async fn dispatch(&self, rule: &str, action: &Action, event: &Event) -> LogLine {
        let line = LogLine::success(event, rule, &action.name, &action.actionner);
        let start = Instant::now();

        let result = match self.registry.get(&action.actionner) {
            Some(actionner) => actionner.execute(action, event).await,
            None => Err(ActionError::UnknownActionner(action.actionner.clone())),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                tracing::info!(
                    rule,
                    action = %action.name,
                    actionner = %action.actionner,
                    subject = %line.subject,
                    trace_id = %line.trace_id,
                    duration_ms,
                    "action succeeded"
                );
                line.with_output(outcome.output).with_objects(outcome.objects)
            }
            Err(e) => {
                tracing::warn!(
                    rule,
                    action = %action.name,
                    actionner = %action.actionner,
                    subject = %line.subject,
                    trace_id = %line.trace_id,
                    error = %e,
                    duration_ms,
                    "action failed"
                );
                line.failed(e.to_string())
            }
        }
    }

    pub async fn dispatch_envelope(&self, envelope: &Envelope) -> LogLine {
        self.dispatch(&envelope.rule, &envelope.action, &envelope.event)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{action, host_event, pod_event};
    use crate::traits::{Actionner, Outcome};

    use std::sync::atomic::{AtomicUsize, Ordering};

    use warden_core::Status;

    struct MockActionner {
        id: &'static str,
        count: Arc<AtomicUsize>,
        fail_with: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl Actionner for MockActionner {
        fn id(&self) -> &str {
            self.id
        }

        async fn execute(&self, _action: &Action, _event: &Event) -> Result<Outcome, ActionError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(reason) => Err(ActionError::InvalidParameters(reason.into())),
                None => Ok(Outcome::with_output("done").object("pod", "pod-a")),
            }
        }
    }

    fn dispatcher(fail_with: Option<&'static str>) -> (Dispatcher, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = ActionnerRegistry::new();
        registry
            .register(Arc::new(MockActionner {
                id: "id1",
                count: count.clone(),
                fail_with,
            }))
            .unwrap();
        (Dispatcher::new(Arc::new(registry)), count)
    }

    #[tokio::test]
    async fn success_line_carries_identifiers() {
        let (dispatcher, count) = dispatcher(None);
        let event = pod_event();

        let line = dispatcher
            .dispatch("R1", &action("id1", serde_json::json!({})), &event)
            .await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(line.status, Status::Success);
        assert!(line.error.is_none());
        assert_eq!(line.output.as_deref(), Some("done"));
        assert_eq!(line.rule, "R1");
        assert_eq!(line.action, "A1");
        assert_eq!(line.actionner, "id1");
        assert_eq!(line.subject, "ns-default/pod-a");
        assert_eq!(line.trace_id, event.trace_id());
    }

    #[tokio::test]
    async fn failure_line_has_error_text() {
        let (dispatcher, count) = dispatcher(Some("boom"));

        let line = dispatcher
            .dispatch("R1", &action("id1", serde_json::json!({})), &host_event())
            .await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(line.status, Status::Failure);
        assert!(line.error.as_deref().is_some_and(|e| e.contains("boom")));
        assert_eq!(line.subject, "node-1");
    }

    #[tokio::test]
    async fn unregistered_actionner_is_a_failure_line() {
        let (dispatcher, count) = dispatcher(None);

        let line = dispatcher
            .dispatch("R1", &action("unknown-id", serde_json::json!({})), &pod_event())
            .await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!line.is_success());
        assert!(line.error.unwrap().contains("unknown-id"));
    }

    #[tokio::test]
    async fn one_line_per_dispatch() {
        let (dispatcher, count) = dispatcher(None);
        let act = action("id1", serde_json::json!({}));
        let event = pod_event();

        let mut lines = Vec::new();
        for _ in 0..3 {
            lines.push(dispatcher.dispatch("R1", &act, &event).await);
        }
        assert_eq!(lines.len(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}

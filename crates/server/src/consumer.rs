//! Delivery side of the pipeline: envelopes surviving the local broker's
//! dedup window are dispatched and their outcome handed to the sinks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use warden_actionners::{Dispatcher, Envelope};
use warden_bus::{EventSubscriber, Message, ACTIONS_TOPIC};
use warden_notify::SinkFanout;

use crate::metrics::PipelineMetrics;

pub struct Consumer<S> {
    subscriber: S,
    dispatcher: Arc<Dispatcher>,
    sinks: SinkFanout,
    metrics: Arc<PipelineMetrics>,
}

impl<S: EventSubscriber> Consumer<S> {
    pub fn new(
        subscriber: S,
        dispatcher: Arc<Dispatcher>,
        sinks: SinkFanout,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            subscriber,
            dispatcher,
            sinks,
            metrics,
        }
    }

    /// Consume until `shutdown` turns true, then wait up to `grace` for
    /// dispatches already started.
    ///
    /// A subscribe failure disables dispatching on this replica; the caller
    /// keeps serving ingress.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>, grace: Duration) {
        if let Err(e) = self.subscriber.subscribe(ACTIONS_TOPIC).await {
            error!(error = %e, "cannot subscribe to the local broker, dispatching disabled");
            return;
        }
        info!(topic = ACTIONS_TOPIC, "consumer started");

        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                received = self.subscriber.recv() => match received {
                    Ok(message) => self.start_dispatch(&mut in_flight, message),
                    Err(e) => warn!(error = %e, "cannot receive from broker"),
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!(pending = in_flight.len(), "waiting for in-flight dispatches");
            let drained = tokio::time::timeout(grace, async {
                while in_flight.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!(aborted = in_flight.len(), "grace period elapsed, aborting dispatches");
                in_flight.abort_all();
            }
        }
        info!("consumer stopped");
    }

    fn start_dispatch(&self, in_flight: &mut JoinSet<()>, message: Message) {
        let envelope: Envelope = match message.decode() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "dropping undecodable envelope");
                return;
            }
        };
        debug!(key = %envelope.key, rule = %envelope.rule, action = %envelope.action.name, "envelope delivered");

        let dispatcher = Arc::clone(&self.dispatcher);
        let sinks = self.sinks.clone();
        let metrics = Arc::clone(&self.metrics);
        in_flight.spawn(async move {
            let line = dispatcher.dispatch_envelope(&envelope).await;
            if line.is_success() {
                PipelineMetrics::incr(&metrics.dispatched_success);
            } else {
                PipelineMetrics::incr(&metrics.dispatched_failure);
            }
            sinks.submit(line);
        });
    }
}

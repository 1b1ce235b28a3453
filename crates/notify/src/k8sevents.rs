//! Kubernetes Event sink.
//!
//! Renders the plain-text template, strips characters the event message
//! cannot carry and attaches the result to the pod as a core/v1 Event.

use std::sync::Arc;

use warden_core::{ClusterClient, ClusterEvent, LogLine};

use crate::templating::{render_plaintext, strip_special_characters, truncate_chars};
use crate::traits::{ResultSink, SinkError};

const COMPONENT: &str = "warden";
const DEFAULT_NAMESPACE: &str = "default";
const MAX_MESSAGE_CHARS: usize = 1024;

pub struct K8sEventsSink {
    client: Arc<dyn ClusterClient>,
}

impl K8sEventsSink {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Event message: rendered, stripped, single quotes turned to double, truncated.
    pub fn message(&self, line: &LogLine) -> Result<String, SinkError> {
        let rendered = render_plaintext(line)?;
        let cleaned = strip_special_characters(&rendered).replace('\'', "\"");
        Ok(truncate_chars(&cleaned, MAX_MESSAGE_CHARS))
    }

    /// The subject's namespace when it exists in the cluster, else `default`.
    async fn target_namespace(&self, line: &LogLine) -> String {
        let Some(namespace) = line.objects.get("namespace") else {
            return DEFAULT_NAMESPACE.to_string();
        };
        match self.client.namespace_exists(namespace).await {
            Ok(true) => namespace.clone(),
            Ok(false) => DEFAULT_NAMESPACE.to_string(),
            Err(e) => {
                tracing::debug!(namespace = %namespace, error = %e, "namespace lookup failed");
                DEFAULT_NAMESPACE.to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl ResultSink for K8sEventsSink {
    async fn send(&self, line: &LogLine) -> Result<(), SinkError> {
        let event = ClusterEvent {
            generate_name: COMPONENT.to_string(),
            pod: line.objects.get("pod").cloned().unwrap_or_default(),
            namespace: self.target_namespace(line).await,
            reason: format!("{COMPONENT}:{}:{}", line.actionner, line.status),
            message: self.message(line)?,
            action: line.actionner.clone(),
            component: COMPONENT.to_string(),
        };
        self.client.create_event(&event).await?;
        tracing::debug!(namespace = %event.namespace, reason = %event.reason, "cluster event created");
        Ok(())
    }

    fn name(&self) -> &str {
        "k8sevents"
    }
}

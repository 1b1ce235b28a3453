//! Cluster API seam used by actionners, result sinks and the lease watcher.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

/// Classified failure from the cluster API.
///
/// Callers branch on the variant (for example "already gone" vs "rejected")
/// instead of on error text.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("request rejected as invalid: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClusterError {
    /// Map a non-2xx API status to its class.
    pub fn from_status(status: u16, kind: &str, name: &str, message: String) -> Self {
        match status {
            404 => Self::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            400 | 422 => Self::Invalid(message),
            409 => Self::Conflict(message),
            401 | 403 => Self::Forbidden(message),
            _ => Self::Api { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

/// A platform event attached to a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterEvent {
    /// Prefix for the server-generated object name.
    pub generate_name: String,
    pub pod: String,
    pub namespace: String,
    pub reason: String,
    pub message: String,
    pub action: String,
    /// Component reported as the event source.
    pub component: String,
}

/// Operations the engine needs from the cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Set or remove pod labels in one request; a `None` value removes the label.
    async fn patch_pod_labels(
        &self,
        namespace: &str,
        pod: &str,
        labels: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError>;

    async fn delete_pod(
        &self,
        namespace: &str,
        pod: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), ClusterError>;

    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClusterError>;

    async fn create_event(&self, event: &ClusterEvent) -> Result<(), ClusterError>;

    /// Current holder identity of a coordination lease, if any.
    async fn lease_holder(&self, namespace: &str, name: &str)
        -> Result<Option<String>, ClusterError>;
}

//! Result sink trait definition and shared error types.

use warden_core::{ClusterError, LogLine};

/// Errors that can occur while delivering a [`LogLine`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("delivery returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A destination for dispatch outcomes.
///
/// Sinks are best-effort: an error is logged by the caller and never
/// affects dispatch or the other sinks.
#[async_trait::async_trait]
pub trait ResultSink: Send + Sync {
    async fn send(&self, line: &LogLine) -> Result<(), SinkError>;

    /// Short name used in logs and configuration (e.g. `"k8sevents"`).
    fn name(&self) -> &str;
}

//! Actionner trait definition and shared error types.

use std::collections::BTreeMap;

use warden_core::{ClusterError, Event};
use warden_rules::Action;

/// Errors raised while validating or executing an action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("the event has no {0} to act on")]
    MissingSubject(&'static str),

    #[error("unknown actionner '{0}'")]
    UnknownActionner(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl From<serde_json::Error> for ActionError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidParameters(e.to_string())
    }
}

/// What an actionner reports back on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Free-form result text.
    pub output: Option<String>,
    /// Objects the action touched, merged into the event's object context.
    pub objects: BTreeMap<String, String>,
}

impl Outcome {
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            objects: BTreeMap::new(),
        }
    }

    pub fn object(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.objects.insert(kind.into(), name.into());
        self
    }
}

/// A remediation capability, registered under a stable identifier.
#[async_trait::async_trait]
pub trait Actionner: Send + Sync {
    /// Identifier referenced by `actionner:` in rule actions, e.g. `kubernetes:labelize`.
    fn id(&self) -> &str;

    /// Check an action's parameters when the rules are loaded.
    fn validate(&self, _action: &Action) -> Result<(), ActionError> {
        Ok(())
    }

    /// Run the action against the cluster for `event`.
    async fn execute(&self, action: &Action, event: &Event) -> Result<Outcome, ActionError>;
}

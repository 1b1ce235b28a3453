use std::sync::Arc;

use serde::Deserialize;
use warden_core::{ClusterClient, Event};
use warden_rules::Action;

use super::pod_subject;
use crate::traits::{ActionError, Actionner, Outcome};

const MAX_GRACE_PERIOD_SECONDS: u32 = 3600;

/// Parameters of `kubernetes:terminate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerminateParams {
    /// Overrides the pod's own termination grace period.
    #[serde(default)]
    pub grace_period_seconds: Option<u32>,
}

impl TerminateParams {
    fn check(&self) -> Result<(), ActionError> {
        match self.grace_period_seconds {
            Some(secs) if secs > MAX_GRACE_PERIOD_SECONDS => Err(ActionError::InvalidParameters(
                format!("grace_period_seconds must be at most {MAX_GRACE_PERIOD_SECONDS}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Deletes the alert's pod.
pub struct Terminate {
    client: Arc<dyn ClusterClient>,
}

impl Terminate {
    pub const ID: &'static str = "kubernetes:terminate";

    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Actionner for Terminate {
    fn id(&self) -> &str {
        Self::ID
    }

    fn validate(&self, action: &Action) -> Result<(), ActionError> {
        action.parameters::<TerminateParams>()?.check()
    }

    async fn execute(&self, action: &Action, event: &Event) -> Result<Outcome, ActionError> {
        let params: TerminateParams = action.parameters()?;
        params.check()?;
        let (namespace, pod) = pod_subject(event)?;

        self.client
            .delete_pod(&namespace, &pod, params.grace_period_seconds)
            .await?;

        Ok(
            Outcome::with_output(format!(
                "the pod '{pod}' in the namespace '{namespace}' has been terminated"
            ))
            .object("pod", pod)
            .object("namespace", namespace),
        )
    }
}

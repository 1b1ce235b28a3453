use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use warden_core::{ClusterClient, Event};
use warden_rules::Action;

use super::pod_subject;
use crate::traits::{ActionError, Actionner, Outcome};

const MAX_LABEL_VALUE: usize = 63;

/// Parameters of `kubernetes:labelize`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelizeParams {
    /// Labels to set; an empty value removes the label.
    pub labels: BTreeMap<String, String>,
}

impl LabelizeParams {
    fn check(&self) -> Result<(), ActionError> {
        if self.labels.is_empty() {
            return Err(ActionError::InvalidParameters("labels must not be empty".into()));
        }
        for (key, value) in &self.labels {
            if key.trim().is_empty() {
                return Err(ActionError::InvalidParameters("label keys must not be empty".into()));
            }
            if value.len() > MAX_LABEL_VALUE {
                return Err(ActionError::InvalidParameters(format!(
                    "value of label '{key}' exceeds {MAX_LABEL_VALUE} characters"
                )));
            }
        }
        Ok(())
    }

    /// Merge-patch form: `None` removes the label.
    fn patch(&self) -> BTreeMap<String, Option<String>> {
        self.labels
            .iter()
            .map(|(k, v)| (k.clone(), (!v.is_empty()).then(|| v.clone())))
            .collect()
    }
}

/// Adds, changes or removes labels on the alert's pod.
pub struct Labelize {
    client: Arc<dyn ClusterClient>,
}

impl Labelize {
    pub const ID: &'static str = "kubernetes:labelize";

    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Actionner for Labelize {
    fn id(&self) -> &str {
        Self::ID
    }

    fn validate(&self, action: &Action) -> Result<(), ActionError> {
        action.parameters::<LabelizeParams>()?.check()
    }

    async fn execute(&self, action: &Action, event: &Event) -> Result<Outcome, ActionError> {
        let params: LabelizeParams = action.parameters()?;
        params.check()?;
        let (namespace, pod) = pod_subject(event)?;
        let patch = params.patch();

        match self.client.patch_pod_labels(&namespace, &pod, &patch).await {
            Ok(()) => {}
            // Removing labels that are already gone is the desired end state.
            Err(e) if e.is_invalid() && patch.values().all(Option::is_none) => {
                tracing::debug!(pod = %pod, namespace = %namespace, "labels already absent");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(
            Outcome::with_output(format!(
                "the pod '{pod}' in the namespace '{namespace}' has been labelized"
            ))
            .object("pod", pod)
            .object("namespace", namespace),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{action, host_event, pod_event, Call, RecordingCluster};

    use serde_json::json;

    #[tokio::test]
    async fn sets_and_removes_labels_in_one_patch() {
        let cluster = Arc::new(RecordingCluster::default());
        let labelize = Labelize::new(cluster.clone());
        let action = action(Labelize::ID, json!({ "labels": { "suspicious": "true", "trusted": "" } }));

        let outcome = labelize.execute(&action, &pod_event()).await.unwrap();

        assert_eq!(
            cluster.calls(),
            vec![Call::PatchLabels {
                namespace: "ns-default".into(),
                pod: "pod-a".into(),
                labels: BTreeMap::from([
                    ("suspicious".to_string(), Some("true".to_string())),
                    ("trusted".to_string(), None),
                ]),
            }]
        );
        assert!(outcome.output.unwrap().contains("pod-a"));
        assert_eq!(outcome.objects["namespace"], "ns-default");
    }

    #[tokio::test]
    async fn removing_absent_labels_succeeds_on_invalid_error() {
        let cluster = Arc::new(RecordingCluster::failing(422));
        let labelize = Labelize::new(cluster);
        let action = action(Labelize::ID, json!({ "labels": { "trusted": "" } }));

        assert!(labelize.execute(&action, &pod_event()).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_error_while_setting_labels_fails() {
        let cluster = Arc::new(RecordingCluster::failing(422));
        let labelize = Labelize::new(cluster);
        let action = action(Labelize::ID, json!({ "labels": { "suspicious": "true" } }));

        let err = labelize.execute(&action, &pod_event()).await.unwrap_err();
        assert!(matches!(err, ActionError::Cluster(_)));
    }

    #[tokio::test]
    async fn event_without_pod_fails() {
        let cluster = Arc::new(RecordingCluster::default());
        let labelize = Labelize::new(cluster.clone());
        let action = action(Labelize::ID, json!({ "labels": { "suspicious": "true" } }));

        let err = labelize.execute(&action, &host_event()).await.unwrap_err();
        assert!(matches!(err, ActionError::MissingSubject("pod")));
        assert!(cluster.calls().is_empty());
    }

    #[test]
    fn validation() {
        let labelize = Labelize::new(Arc::new(RecordingCluster::default()));
        assert!(labelize
            .validate(&action(Labelize::ID, json!({ "labels": { "a": "b" } })))
            .is_ok());
        assert!(labelize.validate(&action(Labelize::ID, json!({ "labels": {} }))).is_err());
        assert!(labelize.validate(&action(Labelize::ID, json!({ "label": { "a": "b" } }))).is_err());
        assert!(labelize
            .validate(&action(Labelize::ID, json!({ "labels": { "a": "x".repeat(64) } })))
            .is_err());
    }
}

//! Test doubles shared by this crate's unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use warden_core::{ClusterClient, ClusterError, ClusterEvent, Event};
use warden_rules::Action;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PatchLabels {
        namespace: String,
        pod: String,
        labels: BTreeMap<String, Option<String>>,
    },
    DeletePod {
        namespace: String,
        pod: String,
        grace_period_seconds: Option<u32>,
    },
}

/// Records cluster calls; fails each call with `fail_with` status when set.
#[derive(Default)]
pub struct RecordingCluster {
    pub calls: Mutex<Vec<Call>>,
    pub count: AtomicUsize,
    pub fail_with: Option<u16>,
}

impl RecordingCluster {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, name: &str) -> Result<(), ClusterError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);
        match self.fail_with {
            Some(status) => Err(ClusterError::from_status(status, "pod", name, "mock failure".into())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterClient for RecordingCluster {
    async fn patch_pod_labels(
        &self,
        namespace: &str,
        pod: &str,
        labels: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError> {
        self.record(
            Call::PatchLabels {
                namespace: namespace.into(),
                pod: pod.into(),
                labels: labels.clone(),
            },
            pod,
        )
    }

    async fn delete_pod(
        &self,
        namespace: &str,
        pod: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), ClusterError> {
        self.record(
            Call::DeletePod {
                namespace: namespace.into(),
                pod: pod.into(),
                grace_period_seconds,
            },
            pod,
        )
    }

    async fn namespace_exists(&self, _namespace: &str) -> Result<bool, ClusterError> {
        Ok(true)
    }

    async fn create_event(&self, _event: &ClusterEvent) -> Result<(), ClusterError> {
        Ok(())
    }

    async fn lease_holder(&self, _: &str, _: &str) -> Result<Option<String>, ClusterError> {
        Ok(None)
    }
}

pub fn action(actionner: &str, parameters: serde_json::Value) -> Action {
    let serde_json::Value::Object(parameters) = parameters else {
        panic!("parameters must be an object");
    };
    Action {
        name: "A1".into(),
        actionner: actionner.into(),
        parameters,
    }
}

/// Alert about `pod-a` in `ns-default`.
pub fn pod_event() -> Event {
    Event::from_json(
        br#"{"uuid":"0b9e3c1e-6a43-4a7c-9d0c-3f1f1b2c7d11","priority":"Critical",
             "rule":"Terminal shell in container","output":"shell spawned","hostname":"node-1",
             "output_fields":{"k8s.pod.name":"pod-a","k8s.ns.name":"ns-default"}}"#,
    )
    .unwrap()
}

/// Host-level alert with no pod subject.
pub fn host_event() -> Event {
    Event::from_json(br#"{"priority":"Warning","rule":"Write below etc","hostname":"node-1"}"#)
        .unwrap()
}

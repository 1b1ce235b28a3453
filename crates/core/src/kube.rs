//! Minimal Kubernetes API client over `reqwest`.
//!
//! Covers exactly the calls behind [`ClusterClient`]. Credentials come from
//! the in-cluster service account unless overridden in [`KubernetesConfig`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::cluster::{ClusterClient, ClusterError, ClusterEvent};
use crate::config::KubernetesConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const IN_CLUSTER_FALLBACK: &str = "https://kubernetes.default.svc";

/// Error body returned by the API server on failures.
#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

#[derive(Debug)]
pub struct KubeClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl KubeClient {
    /// Build a client from config, falling back to the in-cluster environment.
    ///
    /// Missing token or CA files are tolerated (useful against a local proxy);
    /// an unreadable or malformed CA bundle is a configuration error.
    pub fn from_config(config: &KubernetesConfig) -> Result<Self, ClusterError> {
        let base_url = config
            .api_url
            .clone()
            .or_else(in_cluster_url)
            .unwrap_or_else(|| IN_CLUSTER_FALLBACK.to_string())
            .trim_end_matches('/')
            .to_string();

        let token = std::fs::read_to_string(&config.token_file)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if config.ca_file.exists() {
            let pem = std::fs::read(&config.ca_file).map_err(|e| {
                ClusterError::Config(format!("cannot read {}: {e}", config.ca_file.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ClusterError::Config(format!("invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| ClusterError::Config(format!("cannot build HTTP client: {e}")))?;

        tracing::debug!(base_url = %base_url, authenticated = token.is_some(), "kubernetes client ready");
        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, classifying non-2xx responses.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        kind: &str,
        name: &str,
    ) -> Result<reqwest::Response, ClusterError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.json::<ApiStatus>().await.unwrap_or_default();
        Err(ClusterError::from_status(status.as_u16(), kind, name, body.message))
    }
}

fn in_cluster_url() -> Option<String> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    Some(format!("https://{host}:{port}"))
}

/// JSON merge-patch body for pod labels; `null` deletes a label.
pub(crate) fn label_patch(labels: &BTreeMap<String, Option<String>>) -> serde_json::Value {
    json!({ "metadata": { "labels": labels } })
}

fn event_body(event: &ClusterEvent) -> serde_json::Value {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    json!({
        "apiVersion": "v1",
        "kind": "Event",
        "metadata": {
            "generateName": format!("{}-", event.generate_name),
            "namespace": event.namespace,
        },
        "involvedObject": {
            "kind": "Pod",
            "namespace": event.namespace,
            "name": event.pod,
        },
        "reason": event.reason,
        "message": event.message,
        "action": event.action,
        "type": "Normal",
        "source": { "component": event.component },
        "eventTime": now,
        "reportingComponent": event.component,
        "reportingInstance": event.component,
    })
}

#[async_trait]
impl ClusterClient for KubeClient {
    async fn patch_pod_labels(
        &self,
        namespace: &str,
        pod: &str,
        labels: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError> {
        let request = self
            .client
            .patch(self.url(&format!("/api/v1/namespaces/{namespace}/pods/{pod}")))
            .header(reqwest::header::CONTENT_TYPE, "application/merge-patch+json")
            .body(label_patch(labels).to_string());
        self.send(request, "pod", pod).await?;
        Ok(())
    }

    async fn delete_pod(
        &self,
        namespace: &str,
        pod: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), ClusterError> {
        let mut options = json!({ "kind": "DeleteOptions", "apiVersion": "v1" });
        if let Some(grace) = grace_period_seconds {
            options["gracePeriodSeconds"] = json!(grace);
        }
        let request = self
            .client
            .delete(self.url(&format!("/api/v1/namespaces/{namespace}/pods/{pod}")))
            .json(&options);
        self.send(request, "pod", pod).await?;
        Ok(())
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClusterError> {
        let request = self.client.get(self.url(&format!("/api/v1/namespaces/{namespace}")));
        match self.send(request, "namespace", namespace).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_event(&self, event: &ClusterEvent) -> Result<(), ClusterError> {
        let request = self
            .client
            .post(self.url(&format!("/api/v1/namespaces/{}/events", event.namespace)))
            .json(&event_body(event));
        self.send(request, "event", &event.generate_name).await?;
        Ok(())
    }

    async fn lease_holder(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<String>, ClusterError> {
        #[derive(Deserialize)]
        struct Lease {
            #[serde(default)]
            spec: LeaseSpec,
        }
        #[derive(Default, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LeaseSpec {
            holder_identity: Option<String>,
        }

        let request = self.client.get(self.url(&format!(
            "/apis/coordination.k8s.io/v1/namespaces/{namespace}/leases/{name}"
        )));
        let lease: Lease = self.send(request, "lease", name).await?.json().await?;
        Ok(lease.spec.holder_identity.filter(|h| !h.is_empty()))
    }
}

//! The normalized security alert handed to the rule engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Output field carrying the pod name of the alert subject.
pub const POD_FIELD: &str = "k8s.pod.name";
/// Output field carrying the namespace of the alert subject.
pub const NAMESPACE_FIELD: &str = "k8s.ns.name";

// ── Priority ────────────────────────────────────────────────────────

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Debug,
    Informational,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Informational => "Informational",
            Self::Notice => "Notice",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
            Self::Alert => "Alert",
            Self::Emergency => "Emergency",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "informational" | "info" => Ok(Self::Informational),
            "notice" => Ok(Self::Notice),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "emergency" => Ok(Self::Emergency),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Subject ─────────────────────────────────────────────────────────

/// Identity of the workload an alert is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub pod: Option<String>,
    pub namespace: Option<String>,
    pub hostname: String,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.namespace, &self.pod) {
            (Some(ns), Some(pod)) => write!(f, "{ns}/{pod}"),
            (None, Some(pod)) => f.write_str(pod),
            _ => f.write_str(&self.hostname),
        }
    }
}

// ── Event ───────────────────────────────────────────────────────────

/// A security alert as delivered by the runtime sensor.
///
/// Deserialized from the sensor's JSON payload. Once constructed through
/// [`Event::from_json`] the trace id is always set, and the value is only
/// ever shared by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sensor-assigned id, reused as the trace id for every dispatch.
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub output: String,
    pub priority: Priority,
    /// Name of the sensor rule that fired.
    pub rule: String,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub output_fields: BTreeMap<String, serde_json::Value>,
}

impl Event {
    /// Decode an alert payload, assigning a fresh trace id when the sensor sent none.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut event: Event = serde_json::from_slice(bytes)?;
        if event.uuid.trim().is_empty() {
            event.uuid = Uuid::new_v4().to_string();
        }
        Ok(event)
    }

    pub fn trace_id(&self) -> &str {
        &self.uuid
    }

    /// Output field rendered as a string; `null` and missing fields yield `None`.
    pub fn field(&self, key: &str) -> Option<String> {
        match self.output_fields.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn pod_name(&self) -> Option<String> {
        self.field(POD_FIELD).filter(|s| !s.is_empty())
    }

    pub fn namespace_name(&self) -> Option<String> {
        self.field(NAMESPACE_FIELD).filter(|s| !s.is_empty())
    }

    pub fn subject(&self) -> Subject {
        Subject {
            pod: self.pod_name(),
            namespace: self.namespace_name(),
            hostname: self.hostname.clone(),
        }
    }

    /// Object context attached to every [`crate::LogLine`] produced for this event.
    pub fn objects(&self) -> BTreeMap<String, String> {
        let mut objects = BTreeMap::new();
        if let Some(pod) = self.pod_name() {
            objects.insert("pod".to_string(), pod);
        }
        if let Some(ns) = self.namespace_name() {
            objects.insert("namespace".to_string(), ns);
        }
        if !self.hostname.is_empty() {
            objects.insert("hostname".to_string(), self.hostname.clone());
        }
        objects
    }
}

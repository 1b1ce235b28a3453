//! Outcome record of one dispatch attempt.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Outcome of a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured outcome of one action dispatch, consumed by result sinks.
///
/// A failure always carries non-empty `error` text; a success never carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Subject identity (`namespace/pod`, or hostname).
    pub subject: String,
    pub status: Status,
    pub error: Option<String>,
    /// Free-form result reported by the actionner.
    pub output: Option<String>,
    pub rule: String,
    pub action: String,
    pub actionner: String,
    /// Output line of the alert that triggered the rule.
    pub event: String,
    pub trace_id: String,
    pub objects: BTreeMap<String, String>,
    pub time: DateTime<Utc>,
}

impl LogLine {
    /// Successful outcome for `event`, attributed to the given rule, action and actionner.
    pub fn success(event: &Event, rule: &str, action: &str, actionner: &str) -> Self {
        Self {
            subject: event.subject().to_string(),
            status: Status::Success,
            error: None,
            output: None,
            rule: rule.to_string(),
            action: action.to_string(),
            actionner: actionner.to_string(),
            event: event.output.clone(),
            trace_id: event.trace_id().to_string(),
            objects: event.objects(),
            time: Utc::now(),
        }
    }

    /// Turn this line into a failure carrying `error`.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        self.status = Status::Failure;
        self.error = Some(if error.trim().is_empty() {
            "unspecified error".to_string()
        } else {
            error
        });
        self
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.output = output.filter(|o| !o.is_empty());
        self
    }

    /// Merge extra object context reported by the actionner.
    pub fn with_objects(mut self, objects: BTreeMap<String, String>) -> Self {
        self.objects.extend(objects);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

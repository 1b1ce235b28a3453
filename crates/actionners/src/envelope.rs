//! Matched-action envelope carried through the broker.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use warden_core::Event;
use warden_rules::{Action, Rule};

/// One action to run for one alert.
///
/// `key` identifies the remediation, not the alert: it covers the alert's
/// subject, the rule, the action and the actionner, so the same alert
/// received by several replicas (or repeated by the sensor) collapses to one
/// key within the dedup window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub key: String,
    pub rule: String,
    pub action: Action,
    pub event: Event,
}

impl Envelope {
    pub fn new(rule: &Rule, action: &Action, event: &Event) -> Self {
        Self {
            key: dedup_key(&event.subject().to_string(), &rule.name, &action.name, &action.actionner),
            rule: rule.name.clone(),
            action: action.clone(),
            event: event.clone(),
        }
    }
}

/// Hex SHA-256 over the identifying fields, each length-prefixed so that
/// field boundaries cannot shift.
pub fn dedup_key(subject: &str, rule: &str, action: &str, actionner: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [subject, rule, action, actionner] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{action, pod_event};

    fn rule() -> Rule {
        serde_json::from_value(serde_json::json!({
            "name": "R1",
            "actions": [{ "name": "A1", "actionner": "id1" }]
        }))
        .unwrap()
    }

    #[test]
    fn key_ignores_payload_details() {
        let mut first = pod_event();
        let mut second = pod_event();
        first.output = "shell spawned (pid 1)".into();
        second.output = "shell spawned (pid 2)".into();
        second.uuid = "another".into();

        let a = action("id1", serde_json::json!({}));
        assert_eq!(Envelope::new(&rule(), &a, &first).key, Envelope::new(&rule(), &a, &second).key);
    }

    #[test]
    fn key_depends_on_every_identifying_field() {
        let base = dedup_key("ns-default/pod-a", "R1", "A1", "id1");
        assert_eq!(base.len(), 64);
        assert_ne!(base, dedup_key("ns-default/pod-b", "R1", "A1", "id1"));
        assert_ne!(base, dedup_key("ns-default/pod-a", "R2", "A1", "id1"));
        assert_ne!(base, dedup_key("ns-default/pod-a", "R1", "A2", "id1"));
        assert_ne!(base, dedup_key("ns-default/pod-a", "R1", "A1", "id2"));
        assert_ne!(dedup_key("ab", "c", "", ""), dedup_key("a", "bc", "", ""));
    }

    #[test]
    fn survives_messagepack() {
        let envelope = Envelope::new(
            &rule(),
            &action("kubernetes:labelize", serde_json::json!({ "labels": { "a": "b" } })),
            &pod_event(),
        );
        let bytes = rmp_serde::to_vec_named(&envelope).unwrap();
        let decoded: Envelope = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }
}

//! Test doubles shared by the server's unit tests.

use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::TempDir;
use warden_bus::{BusError, EventPublisher, Message};
use warden_core::Event;
use warden_rules::{Action, ActionRejection, ActionValidator, RuleSet};

pub const TWO_RULES: &str = r#"
- name: R1
  match:
    rules: [Terminal shell in container]
  actions:
    - name: A1
      actionner: id1
    - name: A2
      actionner: id1
- name: R2
  match:
    rules: [Terminal shell in container]
    priority: ">=Warning"
  actions:
    - name: A1
      actionner: id1
"#;

/// Accepts only the `id1` actionner.
pub struct OnlyId1;

impl ActionValidator for OnlyId1 {
    fn validate_action(&self, action: &Action) -> Result<(), ActionRejection> {
        if action.actionner == "id1" {
            Ok(())
        } else {
            Err(ActionRejection::UnknownActionner)
        }
    }
}

pub fn write_rules(dir: &TempDir, yaml: &str) -> PathBuf {
    let path = dir.path().join("rules.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

pub fn rule_set(yaml: &str) -> (TempDir, RuleSet) {
    let dir = TempDir::new().unwrap();
    let path = write_rules(&dir, yaml);
    let rules = RuleSet::load(&[path], &OnlyId1).unwrap();
    (dir, rules)
}

pub fn event_json(rule: &str) -> String {
    serde_json::json!({
        "uuid": "trace-1",
        "output": "shell in pod-a",
        "priority": "Critical",
        "rule": rule,
        "hostname": "node-1",
        "output_fields": { "k8s.pod.name": "pod-a", "k8s.ns.name": "ns-default" }
    })
    .to_string()
}

pub fn event(rule: &str) -> Event {
    Event::from_json(event_json(rule).as_bytes()).unwrap()
}

#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<Message>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        if self.fail {
            return Err(BusError::Transport("broker unreachable".into()));
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

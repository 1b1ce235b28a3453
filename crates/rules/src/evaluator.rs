//! Matching alerts against rules.

use warden_core::Event;

use crate::schema::{FieldConditions, FieldOp, Match, Rule, TagSet};

impl Match {
    /// Whether the alert satisfies every criterion that is set.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.rules.is_empty() && !self.rules.iter().any(|r| r == &event.rule) {
            return false;
        }
        if let Some(filter) = &self.priority {
            if !filter.accepts(event.priority) {
                return false;
            }
        }
        if !self.sources.is_empty() && !self.sources.iter().any(|s| s == &event.source) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|set| set.is_subset_of(&event.tags)) {
            return false;
        }
        if !self.output_fields.is_empty()
            && !self.output_fields.iter().any(|conditions| conditions.hold_for(event))
        {
            return false;
        }
        true
    }
}

impl TagSet {
    fn is_subset_of(&self, tags: &[String]) -> bool {
        self.0.iter().all(|wanted| tags.iter().any(|t| t == wanted))
    }
}

impl FieldConditions {
    fn hold_for(&self, event: &Event) -> bool {
        self.0.iter().all(|condition| {
            let actual = event.field(&condition.field);
            match condition.op {
                FieldOp::Equals => actual.as_deref() == Some(condition.value.as_str()),
                // An absent field differs from any value.
                FieldOp::NotEquals => actual.as_deref() != Some(condition.value.as_str()),
            }
        })
    }
}

impl Rule {
    pub fn matches(&self, event: &Event) -> bool {
        self.matcher.matches(event)
    }
}

/// Rules matching `event`, in load order, stopping after the first matching
/// rule that has `continue: false`.
pub fn matching_rules<'a>(rules: &'a [Rule], event: &Event) -> Vec<&'a Rule> {
    let mut matched = Vec::new();
    for rule in rules {
        if rule.matches(event) {
            matched.push(rule);
            if !rule.continue_matching {
                break;
            }
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: &str) -> Event {
        Event::from_json(json.as_bytes()).unwrap()
    }

    fn shell_event() -> Event {
        event(
            r#"{"priority":"Critical","rule":"Terminal shell in container","source":"syscall",
                "tags":["container","mitre_execution"],
                "output_fields":{"k8s.pod.name":"pod-a","k8s.ns.name":"ns-default"}}"#,
        )
    }

    fn rules(yaml: &str) -> Vec<Rule> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn empty_match_accepts_everything() {
        assert!(Match::default().matches(&shell_event()));
    }

    #[test]
    fn rule_name_and_priority() {
        let rs = rules(
            r#"
- name: shell
  match: { rules: [Terminal shell in container], priority: ">=Warning" }
- name: too-high
  match: { priority: ">Critical" }
- name: other
  match: { rules: [Write below etc] }
"#,
        );
        let names: Vec<_> = matching_rules(&rs, &shell_event())
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["shell"]);
    }

    #[test]
    fn tag_sets_are_alternatives_of_conjunctions() {
        let rs = rules(
            r#"
- name: both
  match: { tags: ["container, mitre_execution"] }
- name: missing-one
  match: { tags: ["container, network"] }
- name: either
  match: { tags: ["network", "container"] }
"#,
        );
        let names: Vec<_> = matching_rules(&rs, &shell_event())
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["both", "either"]);
    }

    #[test]
    fn output_field_conditions() {
        let rs = rules(
            r#"
- name: not-system
  match: { output_fields: ["k8s.ns.name!=kube-system"] }
- name: exact-pod
  match: { output_fields: ["k8s.ns.name=ns-default, k8s.pod.name=pod-a"] }
- name: wrong-pod
  match: { output_fields: ["k8s.pod.name=pod-b"] }
- name: absent-field
  match: { output_fields: ["container.id!=abc"] }
"#,
        );
        let names: Vec<_> = matching_rules(&rs, &shell_event())
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["not-system", "exact-pod", "absent-field"]);
    }

    #[test]
    fn continue_false_stops_evaluation() {
        let rs = rules(
            r#"
- name: first
  continue: false
- name: second
"#,
        );
        let matched = matching_rules(&rs, &shell_event());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "first");
    }

    #[test]
    fn non_matching_stop_rule_does_not_stop() {
        let rs = rules(
            r#"
- name: stopper
  continue: false
  match: { sources: [k8s_audit] }
- name: second
"#,
        );
        let matched = matching_rules(&rs, &shell_event());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "second");
    }
}

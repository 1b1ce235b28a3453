//! Rule set validation.
//!
//! Structural checks (names, uniqueness, non-empty action lists) run first,
//! then every action is checked against an [`ActionValidator`], normally the
//! actionner registry. Any problem rejects the whole rule set.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::schema::{Action, Rule};

/// Why an action cannot run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRejection {
    /// No actionner is registered under the action's identifier.
    UnknownActionner,
    /// The actionner rejected the action's parameters.
    InvalidParameters(String),
}

/// Checks actions against the set of available actionners.
pub trait ActionValidator: Send + Sync {
    fn validate_action(&self, action: &Action) -> Result<(), ActionRejection>;
}

/// One validation failure, located by file, rule and action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleProblem {
    pub file: PathBuf,
    pub rule: String,
    pub action: Option<String>,
    pub actionner: Option<String>,
    pub message: String,
}

impl fmt::Display for RuleProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule '{}'", self.rule)?;
        if let Some(action) = &self.action {
            write!(f, ", action '{action}'")?;
        }
        write!(f, ": {} ({})", self.message, self.file.display())
    }
}

fn rule_problem(rule: &Rule, message: impl Into<String>) -> RuleProblem {
    RuleProblem {
        file: rule.file.clone(),
        rule: rule.name.clone(),
        action: None,
        actionner: None,
        message: message.into(),
    }
}

fn action_problem(rule: &Rule, action: &Action, message: impl Into<String>) -> RuleProblem {
    RuleProblem {
        file: rule.file.clone(),
        rule: rule.name.clone(),
        action: Some(action.name.clone()),
        actionner: Some(action.actionner.clone()),
        message: message.into(),
    }
}

/// Validate rules loaded from all files, returning every problem found.
pub fn validate_rules(rules: &[Rule], validator: &dyn ActionValidator) -> Vec<RuleProblem> {
    let mut problems = Vec::new();
    let mut seen_rules = HashSet::new();

    for rule in rules {
        if rule.name.trim().is_empty() {
            problems.push(rule_problem(rule, "rule name must not be empty"));
        } else if !seen_rules.insert(rule.name.as_str()) {
            problems.push(rule_problem(rule, "duplicate rule name"));
        }

        if rule.actions.is_empty() {
            problems.push(rule_problem(rule, "rule has no actions"));
        }

        let mut seen_actions = HashSet::new();
        for action in &rule.actions {
            if action.name.trim().is_empty() {
                problems.push(action_problem(rule, action, "action name must not be empty"));
            } else if !seen_actions.insert(action.name.as_str()) {
                problems.push(action_problem(rule, action, "duplicate action name in rule"));
            }

            match validator.validate_action(action) {
                Ok(()) => {}
                Err(ActionRejection::UnknownActionner) => problems.push(action_problem(
                    rule,
                    action,
                    format!("unknown actionner '{}'", action.actionner),
                )),
                Err(ActionRejection::InvalidParameters(reason)) => problems.push(action_problem(
                    rule,
                    action,
                    format!("invalid parameters for '{}': {reason}", action.actionner),
                )),
            }
        }
    }

    problems
}

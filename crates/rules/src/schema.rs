//! YAML rule schema.
//!
//! A rules file is a YAML list of [`Rule`]s:
//!
//! ```yaml
//! - name: Suspicious shell
//!   match:
//!     rules: [Terminal shell in container]
//!     priority: ">=Warning"
//!     tags: ["container, mitre_execution"]
//!     output_fields: ["k8s.ns.name!=kube-system"]
//!   continue: false
//!   actions:
//!     - name: Labelize pod
//!       actionner: kubernetes:labelize
//!       parameters:
//!         labels:
//!           suspicious: "true"
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use warden_core::Priority;

fn default_true() -> bool {
    true
}

// ── Rule ────────────────────────────────────────────────────────────

/// A named predicate over alerts plus the ordered actions it triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "match", default)]
    pub matcher: Match,
    /// When false, rules after this one are not evaluated once it matched.
    #[serde(rename = "continue", default = "default_true")]
    pub continue_matching: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// File the rule was loaded from.
    #[serde(default, skip_deserializing)]
    pub file: PathBuf,
}

// ── Action ──────────────────────────────────────────────────────────

/// One remediation step, executed by the actionner it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    pub name: String,
    pub actionner: String,
    /// Raw parameters; each actionner decodes them into its own typed struct.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl Action {
    /// Decode the parameter map into an actionner's typed parameters.
    pub fn parameters<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.parameters.clone()))
    }
}

// ── Match predicate ─────────────────────────────────────────────────

/// Predicate over alert fields. Every non-empty criterion must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Match {
    /// Sensor rule names; any may match.
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub priority: Option<PriorityFilter>,
    /// Alternatives; each entry is a comma-separated set of required tags.
    #[serde(default)]
    pub tags: Vec<TagSet>,
    /// Alternatives; each entry is a comma-separated conjunction of field conditions.
    #[serde(default)]
    pub output_fields: Vec<FieldConditions>,
    /// Event sources; any may match.
    #[serde(default)]
    pub sources: Vec<String>,
}

// ── Priority filter ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
}

impl Comparator {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Lt => "<",
        }
    }
}

/// Priority comparison such as `">=Warning"`; a bare level means equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PriorityFilter {
    pub comparator: Comparator,
    pub priority: Priority,
}

impl PriorityFilter {
    pub fn accepts(&self, priority: Priority) -> bool {
        match self.comparator {
            Comparator::Eq => priority == self.priority,
            Comparator::Ge => priority >= self.priority,
            Comparator::Gt => priority > self.priority,
            Comparator::Le => priority <= self.priority,
            Comparator::Lt => priority < self.priority,
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (comparator, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (Comparator::Ge, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (Comparator::Le, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Comparator::Gt, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Comparator::Lt, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Comparator::Eq, rest)
        } else {
            (Comparator::Eq, s)
        };
        Ok(Self {
            comparator,
            priority: rest.parse()?,
        })
    }
}

impl TryFrom<String> for PriorityFilter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PriorityFilter> for String {
    fn from(filter: PriorityFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.comparator.as_str(), self.priority)
    }
}

// ── Tag sets ────────────────────────────────────────────────────────

/// Tags that must all be present on an alert, written `"a, b, c"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagSet(pub Vec<String>);

impl TryFrom<String> for TagSet {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let tags: Vec<String> = split_list(&value).map(str::to_string).collect();
        if tags.is_empty() {
            return Err("tag set must not be empty".to_string());
        }
        Ok(Self(tags))
    }
}

impl From<TagSet> for String {
    fn from(set: TagSet) -> Self {
        set.0.join(", ")
    }
}

// ── Output field conditions ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Equals,
    NotEquals,
}

/// A single `key=value` or `key!=value` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCondition {
    pub field: String,
    pub op: FieldOp,
    pub value: String,
}

impl FromStr for FieldCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, op, value) = if let Some((field, value)) = s.split_once("!=") {
            (field, FieldOp::NotEquals, value)
        } else if let Some((field, value)) = s.split_once('=') {
            (field, FieldOp::Equals, value)
        } else {
            return Err(format!("condition '{s}' must be 'field=value' or 'field!=value'"));
        };
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("condition '{s}' has an empty field name"));
        }
        Ok(Self {
            field: field.to_string(),
            op,
            value: value.trim().to_string(),
        })
    }
}

impl fmt::Display for FieldCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            FieldOp::Equals => "=",
            FieldOp::NotEquals => "!=",
        };
        write!(f, "{}{}{}", self.field, op, self.value)
    }
}

/// Conditions that must all hold, written `"k8s.ns.name=prod, proc.name!=sh"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldConditions(pub Vec<FieldCondition>);

impl TryFrom<String> for FieldConditions {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let conditions = split_list(&value)
            .map(str::parse)
            .collect::<Result<Vec<FieldCondition>, _>>()?;
        if conditions.is_empty() {
            return Err("output field conditions must not be empty".to_string());
        }
        Ok(Self(conditions))
    }
}

impl From<FieldConditions> for String {
    fn from(set: FieldConditions) -> Self {
        set.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

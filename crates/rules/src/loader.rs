//! Loading rule files into a validated [`RuleSet`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use warden_core::Event;

use crate::evaluator::matching_rules;
use crate::schema::Rule;
use crate::validation::{validate_rules, ActionValidator, RuleProblem};

// ── Error type ──────────────────────────────────────────────────────

/// A rule set that cannot be loaded. Fatal at startup; rejected on reload.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read rules file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in rules file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid rules: {}", join_problems(.0))]
    Invalid(Vec<RuleProblem>),

    #[error("rules file {} no longer defines any rule", path.display())]
    Emptied { path: PathBuf },
}

fn join_problems(problems: &[RuleProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Rule set ────────────────────────────────────────────────────────

/// Immutable, validated collection of rules from one or more files.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
    files: Vec<PathBuf>,
    loaded_at: DateTime<Utc>,
}

impl RuleSet {
    /// Parse every file, concatenating rules in file order, then validate.
    pub fn load(files: &[PathBuf], validator: &dyn ActionValidator) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();
        for path in files {
            rules.extend(parse_file(path)?);
        }

        let problems = validate_rules(&rules, validator);
        if !problems.is_empty() {
            for problem in &problems {
                error!(
                    rule = %problem.rule,
                    action = problem.action.as_deref().unwrap_or(""),
                    actionner = problem.actionner.as_deref().unwrap_or(""),
                    file = %problem.file.display(),
                    error = %problem.message,
                    "invalid rule"
                );
            }
            return Err(ConfigError::Invalid(problems));
        }

        if rules.is_empty() {
            warn!(files = ?files, "no rules defined");
        }
        info!(count = rules.len(), "rules have been successfully loaded");

        Ok(Self {
            rules,
            files: files.to_vec(),
            loaded_at: Utc::now(),
        })
    }

    /// A rule set that matches nothing.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            files: Vec::new(),
            loaded_at: Utc::now(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules that came from `path`.
    pub fn count_from(&self, path: &Path) -> usize {
        self.rules.iter().filter(|r| r.file.as_path() == path).count()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Rules matching `event`, honoring `continue: false`.
    pub fn matching(&self, event: &Event) -> Vec<&Rule> {
        matching_rules(&self.rules, event)
    }
}

/// Parse one YAML file holding a list of rules.
pub fn parse_file(path: &Path) -> Result<Vec<Rule>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut rules: Vec<Rule> =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    for rule in &mut rules {
        rule.file = path.to_path_buf();
    }
    Ok(rules)
}

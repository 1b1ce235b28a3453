//! Response rules: YAML schema, validation, matching and hot reload.
//!
//! This crate provides:
//! - Rule definitions deserialized from YAML files
//! - Validation of every action against the available actionners
//! - Matching of alerts against the loaded rules
//! - An atomically swapped rule store with `notify`-driven reload

pub mod evaluator;
pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use evaluator::matching_rules;
pub use loader::{ConfigError, RuleSet};
pub use schema::{Action, Match, Rule};
pub use store::{Reloader, RuleStore};
pub use validation::{ActionRejection, ActionValidator, RuleProblem};
pub use watcher::{Cooldown, RuleWatcher, WatchError, RELOAD_COOLDOWN};

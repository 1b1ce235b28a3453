//! Identifier → actionner map, consulted by rule validation and the dispatcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use warden_core::ClusterClient;
use warden_rules::{Action, ActionRejection, ActionValidator};

use crate::kubernetes::{Labelize, Terminate};
use crate::traits::{ActionError, Actionner};

/// Registering a second actionner under an existing identifier.
#[derive(Debug, thiserror::Error)]
#[error("actionner '{0}' is already registered")]
pub struct DuplicateActionner(pub String);

#[derive(Default)]
pub struct ActionnerRegistry {
    actionners: BTreeMap<String, Arc<dyn Actionner>>,
}

impl ActionnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in actionners, acting through `client`.
    pub fn with_defaults(client: Arc<dyn ClusterClient>) -> Self {
        let mut registry = Self::new();
        for actionner in default_actionners(client) {
            // Built-in ids are distinct.
            let _ = registry.register(actionner);
        }
        registry
    }

    pub fn register(&mut self, actionner: Arc<dyn Actionner>) -> Result<(), DuplicateActionner> {
        let id = actionner.id().to_string();
        if self.actionners.contains_key(&id) {
            return Err(DuplicateActionner(id));
        }
        tracing::debug!(actionner = %id, "actionner registered");
        self.actionners.insert(id, actionner);
        Ok(())
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Actionner>> {
        self.actionners.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.actionners.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actionners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actionners.is_empty()
    }
}

impl ActionValidator for ActionnerRegistry {
    fn validate_action(&self, action: &Action) -> Result<(), ActionRejection> {
        let actionner = self
            .get(&action.actionner)
            .ok_or(ActionRejection::UnknownActionner)?;
        actionner.validate(action).map_err(|e| match e {
            ActionError::InvalidParameters(reason) => ActionRejection::InvalidParameters(reason),
            other => ActionRejection::InvalidParameters(other.to_string()),
        })
    }
}

fn default_actionners(client: Arc<dyn ClusterClient>) -> Vec<Arc<dyn Actionner>> {
    vec![
        Arc::new(Labelize::new(Arc::clone(&client))),
        Arc::new(Terminate::new(client)),
    ]
}

//! The active rule set, shared by request handlers and swapped on reload.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, info};

use crate::loader::{ConfigError, RuleSet};
use crate::validation::ActionValidator;

/// Holder of the current [`RuleSet`] snapshot.
///
/// Readers clone the `Arc` and keep matching against that snapshot even if a
/// reload replaces it meanwhile. A swap replaces the pointer in one step, so
/// no reader can observe a partially built set.
#[derive(Debug)]
pub struct RuleStore {
    current: RwLock<Arc<RuleSet>>,
}

impl RuleStore {
    pub fn new(initial: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Install `next`, returning the set it replaced.
    pub fn replace(&self, next: RuleSet) -> Arc<RuleSet> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(next))
    }
}

/// Re-reads the configured rule files into a [`RuleStore`].
pub struct Reloader {
    files: Vec<PathBuf>,
    store: Arc<RuleStore>,
    validator: Arc<dyn ActionValidator>,
}

impl Reloader {
    pub fn new(files: Vec<PathBuf>, store: Arc<RuleStore>, validator: Arc<dyn ActionValidator>) -> Self {
        Self {
            files,
            store,
            validator,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Load and validate the files; on success swap the store, on failure keep
    /// the previous set serving. Returns the new rule count.
    ///
    /// A file that held rules and now parses to none is treated as a partial
    /// write and rejected.
    pub fn reload(&self) -> Result<usize, ConfigError> {
        let loaded = RuleSet::load(&self.files, self.validator.as_ref()).and_then(|set| {
            let current = self.store.snapshot();
            match self
                .files
                .iter()
                .find(|f| current.count_from(f) > 0 && set.count_from(f) == 0)
            {
                Some(path) => Err(ConfigError::Emptied { path: path.clone() }),
                None => Ok(set),
            }
        });
        match loaded {
            Ok(set) => {
                let count = set.len();
                let previous = self.store.replace(set);
                info!(count, previous = previous.len(), "rules reloaded");
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, "invalid rules, keeping the previous rule set");
                Err(e)
            }
        }
    }
}

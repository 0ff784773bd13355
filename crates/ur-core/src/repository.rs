//! Persistence contract for user rules
//!
//! The engine only needs three operations from storage. Implementations
//! must round-trip every field of a [`Filter`] exactly.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PersistenceError;
use crate::filter::Filter;

/// Durable store of user rules.
pub trait RuleRepository: Send + Sync {
    /// Every stored rule, in the order it was added.
    fn get_all_rules(&self) -> Result<Vec<Filter>, PersistenceError>;

    /// Store new rules.
    fn add_rules(&self, filters: &[Filter]) -> Result<(), PersistenceError>;

    /// Delete a rule. Deleting an absent rule succeeds.
    fn remove_rule(&self, filter: &Filter) -> Result<(), PersistenceError>;
}

impl<R: RuleRepository + ?Sized> RuleRepository for Arc<R> {
    fn get_all_rules(&self) -> Result<Vec<Filter>, PersistenceError> {
        (**self).get_all_rules()
    }

    fn add_rules(&self, filters: &[Filter]) -> Result<(), PersistenceError> {
        (**self).add_rules(filters)
    }

    fn remove_rule(&self, filter: &Filter) -> Result<(), PersistenceError> {
        (**self).remove_rule(filter)
    }
}

/// Volatile repository, for embedding without storage and for tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    rules: Mutex<Vec<Filter>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-populated with rules, as if loaded from disk.
    pub fn with_rules(rules: Vec<Filter>) -> Self {
        Self {
            rules: Mutex::new(rules),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.lock().is_empty()
    }
}

impl RuleRepository for MemoryRepository {
    fn get_all_rules(&self) -> Result<Vec<Filter>, PersistenceError> {
        Ok(self.rules.lock().clone())
    }

    fn add_rules(&self, filters: &[Filter]) -> Result<(), PersistenceError> {
        let mut rules = self.rules.lock();
        for filter in filters {
            if !rules.contains(filter) {
                rules.push(filter.clone());
            }
        }
        Ok(())
    }

    fn remove_rule(&self, filter: &Filter) -> Result<(), PersistenceError> {
        self.rules.lock().retain(|f| f != filter);
        Ok(())
    }
}

//! Ordered rule storage
//!
//! Insertion order is evaluation order and also the 1-based numbering shown
//! to the administrator. Removing rule `k` renumbers every rule after it.

use super::rule::Rule;
use crate::{Error, Result};

/// Ordered, mutable collection of rules
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: Vec<Rule>,
    /// Optional cap on the number of rules
    max_rules: Option<usize>,
}

impl RuleStore {
    /// Create an empty, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding at most `max_rules` rules
    pub fn with_limit(max_rules: usize) -> Self {
        Self {
            rules: Vec::new(),
            max_rules: Some(max_rules),
        }
    }

    /// Append a rule at the end, returning its 1-based index.
    ///
    /// Fails instead of dropping the rule when memory or the configured cap
    /// runs out.
    pub fn append(&mut self, rule: Rule) -> Result<usize> {
        if let Some(max) = self.max_rules {
            if self.rules.len() >= max {
                return Err(Error::StoreFull { max });
            }
        }
        self.rules.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        self.rules.push(rule);
        Ok(self.rules.len())
    }

    /// Remove the rule at 1-based `index`. Out-of-range is a no-op.
    pub fn remove_at(&mut self, index: usize) -> Option<Rule> {
        if index == 0 || index > self.rules.len() {
            return None;
        }
        Some(self.rules.remove(index - 1))
    }

    /// Rules in evaluation order with their 1-based indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Rule)> + '_ {
        self.rules.iter().enumerate().map(|(i, rule)| (i + 1, rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Drop every rule
    pub fn clear(&mut self) {
        self.rules.clear();
    }
}

//! Explicit name -> strategy table, built once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{CadenceError, CadenceResult};
use super::resume::ResumeCadenceAfterFailure;
use super::retry::RetryFailedObservations;
use super::strategy::CadenceStrategy;

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    /// Canonical names and aliases alike.
    strategies: BTreeMap<String, Arc<dyn CadenceStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every strategy shipped with the crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for strategy in [
            Arc::new(RetryFailedObservations) as Arc<dyn CadenceStrategy>,
            Arc::new(ResumeCadenceAfterFailure) as Arc<dyn CadenceStrategy>,
        ] {
            // Built-in names are distinct.
            let _ = registry.register(strategy);
        }
        registry
    }

    /// Register under the strategy's name and aliases. Rejects the whole
    /// registration if any of them is taken.
    pub fn register(&mut self, strategy: Arc<dyn CadenceStrategy>) -> CadenceResult<()> {
        let names: Vec<&str> = std::iter::once(strategy.name())
            .chain(strategy.aliases().iter().copied())
            .collect();
        if let Some(taken) = names.iter().find(|n| self.strategies.contains_key(**n)) {
            return Err(CadenceError::DuplicateStrategy {
                name: taken.to_string(),
            });
        }
        for name in names {
            self.strategies.insert(name.to_string(), Arc::clone(&strategy));
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> CadenceResult<Arc<dyn CadenceStrategy>> {
        self.strategies
            .get(name.trim())
            .cloned()
            .ok_or_else(|| CadenceError::UnknownStrategy {
                name: name.to_string(),
            })
    }

    /// Only the strategies named in `enabled` (canonical names or aliases).
    ///
    /// An unknown name is a startup configuration error.
    pub fn restricted_to<S: AsRef<str>>(&self, enabled: &[S]) -> CadenceResult<Self> {
        let mut restricted = Self::new();
        for name in enabled {
            let strategy = self.resolve(name.as_ref())?;
            if restricted.strategies.contains_key(strategy.name()) {
                continue;
            }
            restricted.register(strategy)?;
        }
        Ok(restricted)
    }

    /// Canonical names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .strategies
            .values()
            .map(|s| s.name())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn strategies(&self) -> Vec<Arc<dyn CadenceStrategy>> {
        self.names()
            .into_iter()
            .filter_map(|name| self.strategies.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

//! Ordered registry of healing strategies.

use std::sync::Arc;

use tracing::debug;

use crate::config::StrategySettings;
use crate::strategies::{
    AttributeStrategy, FuzzyStrategy, HealingStrategy, HierarchyStrategy, PositionStrategy,
    TextStrategy, TreeAnalysisStrategy,
};

#[derive(Clone)]
struct Entry {
    strategy: Arc<dyn HealingStrategy>,
    priority: i32,
    enabled: bool,
}

/// Strategies with their priority and enablement.
///
/// The orchestrator only ever sees [`StrategyRegistry::ordered`], so new
/// strategies plug in through [`StrategyRegistry::register`].
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|e| (e.strategy.name(), e.priority, e.enabled)),
            )
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The six built-in strategies, tuned and overridden by `settings`.
    pub fn with_defaults(settings: &StrategySettings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextStrategy));
        registry.register(Arc::new(AttributeStrategy));
        registry.register(Arc::new(HierarchyStrategy::new(settings.max_hierarchy_depth)));
        registry.register(Arc::new(PositionStrategy::new(settings.position_tolerance_px)));
        registry.register(Arc::new(FuzzyStrategy));
        registry.register(Arc::new(TreeAnalysisStrategy::new(settings.similarity_threshold)));

        for (name, priority) in &settings.priorities {
            registry.set_priority(name, *priority);
        }
        for name in &settings.disabled {
            registry.set_enabled(name, false);
        }
        registry
    }

    /// Adds a strategy at its default priority, replacing one with the same name.
    pub fn register(&mut self, strategy: Arc<dyn HealingStrategy>) {
        let entry = Entry {
            priority: strategy.default_priority(),
            strategy,
            enabled: true,
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.strategy.name() == entry.strategy.name())
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Returns `false` when no strategy has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.strategy.name() == name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => {
                debug!("Unknown strategy '{}' in enablement override", name);
                false
            }
        }
    }

    /// Returns `false` when no strategy has that name.
    pub fn set_priority(&mut self, name: &str, priority: i32) -> bool {
        match self.entries.iter_mut().find(|e| e.strategy.name() == name) {
            Some(entry) => {
                entry.priority = priority;
                true
            }
            None => {
                debug!("Unknown strategy '{}' in priority override", name);
                false
            }
        }
    }

    pub fn priority_of(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|e| e.strategy.name() == name)
            .map(|e| e.priority)
    }

    /// Enabled strategies by descending priority; ties keep registration order.
    pub fn ordered(&self) -> Vec<Arc<dyn HealingStrategy>> {
        let mut enabled: Vec<&Entry> = self.entries.iter().filter(|e| e.enabled).collect();
        enabled.sort_by(|a, b| b.priority.cmp(&a.priority));
        enabled.into_iter().map(|e| e.strategy.clone()).collect()
    }

    /// Names of every registered strategy, enabled or not, in cascade order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut all: Vec<&Entry> = self.entries.iter().collect();
        all.sort_by(|a, b| b.priority.cmp(&a.priority));
        all.into_iter().map(|e| e.strategy.name()).collect()
    }
}

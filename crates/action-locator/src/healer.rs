//! Healing history owned by one orchestrator

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use locator_core_types::{IdSource, SequentialIdSource};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One successful heal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealRecord {
    pub id: String,
    pub original: String,
    pub healed: String,
    pub strategy: String,
    pub confidence: f64,
    pub timestamp_ms: i64,
}

/// Heals keyed by the original selector, oldest first.
pub struct HealingHistory {
    records: RwLock<HashMap<String, Vec<HealRecord>>>,
    ids: Arc<dyn IdSource>,
}

impl Default for HealingHistory {
    fn default() -> Self {
        Self::new(Arc::new(SequentialIdSource::default()))
    }
}

impl HealingHistory {
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ids,
        }
    }

    pub fn record(
        &self,
        original: &str,
        healed: &str,
        strategy: &str,
        confidence: f64,
    ) -> HealRecord {
        let record = HealRecord {
            id: self.ids.next_id("heal"),
            original: original.to_string(),
            healed: healed.to_string(),
            strategy: strategy.to_string(),
            confidence,
            timestamp_ms: Utc::now().timestamp_millis(),
        };
        info!(
            "Healed '{}' -> '{}' via {} (confidence: {:.2})",
            original, healed, strategy, confidence
        );
        self.records
            .write()
            .entry(original.to_string())
            .or_default()
            .push(record.clone());
        record
    }

    pub fn for_selector(&self, original: &str) -> Vec<HealRecord> {
        self.records
            .read()
            .get(original)
            .cloned()
            .unwrap_or_default()
    }

    pub fn latest(&self, original: &str) -> Option<HealRecord> {
        self.records
            .read()
            .get(original)
            .and_then(|records| records.last().cloned())
    }

    /// Every record, ordered by timestamp then id.
    pub fn all(&self) -> Vec<HealRecord> {
        let mut all: Vec<HealRecord> = self.records.read().values().flatten().cloned().collect();
        all.sort_by(|a, b| {
            a.timestamp_ms
                .cmp(&b.timestamp_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.records.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_keyed_by_original() {
        let history = HealingHistory::new(Arc::new(SequentialIdSource::seeded(7)));
        history.record("#login", "button:has-text(\"Sign In\")", "text", 0.7);
        history.record("#login", "button.primary", "attribute", 0.6);
        history.record("#other", "a", "fuzzy", 0.4);

        let login = history.for_selector("#login");
        assert_eq!(login.len(), 2);
        assert!(login[0].id.starts_with("heal-1-"));
        assert_eq!(history.latest("#login").unwrap().strategy, "attribute");
        assert_eq!(history.len(), 3);
        assert!(history.for_selector("#missing").is_empty());

        history.clear();
        assert!(history.is_empty());
    }
}

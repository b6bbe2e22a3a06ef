//! Locator configuration.
//!
//! Values start from the built-in defaults, then YAML files are overlaid in
//! order, then `LOCATOR__<SECTION>__<KEY>` environment variables. Overlays are
//! applied on a `serde_json::Value` by dotted path before the typed config is
//! deserialized and validated.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::LocatorError;
use crate::strategies::hierarchy::MAX_HIERARCHY_DEPTH;
use crate::types::SelectorType;

pub const ENV_PREFIX: &str = "LOCATOR__";

/// Candidate generation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorOptions {
    /// Preferred selector types, best first; unlisted types rank after listed ones
    pub priority: Vec<SelectorType>,
    /// Relax to the top three candidates when the unique/stable filter empties the list
    pub fallback: bool,
    /// Drop leading ancestor segments from class paths while they stay unique
    pub optimize: bool,
    pub include_id: bool,
    pub include_class: bool,
    pub include_attributes: bool,
    pub include_text: bool,
    pub include_position: bool,
    pub unique: bool,
    pub stable: bool,
    pub max_alternatives: usize,
    pub custom_attributes: Vec<String>,
    pub ignore_attributes: Vec<String>,
    pub aria_label_fallback: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            priority: SelectorType::ALL.to_vec(),
            fallback: true,
            optimize: true,
            include_id: true,
            include_class: true,
            include_attributes: true,
            include_text: true,
            include_position: false,
            unique: true,
            stable: false,
            max_alternatives: 5,
            custom_attributes: vec![
                "data-testid".to_string(),
                "data-test".to_string(),
                "data-test-id".to_string(),
                "data-cy".to_string(),
                "data-qa".to_string(),
            ],
            ignore_attributes: Vec::new(),
            aria_label_fallback: true,
        }
    }
}

impl SelectorOptions {
    pub fn is_ignored(&self, attribute: &str) -> bool {
        self.ignore_attributes
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(attribute))
    }

    /// Position of `selector_type` in the priority list.
    pub fn priority_rank(&self, selector_type: SelectorType) -> usize {
        self.priority
            .iter()
            .position(|t| *t == selector_type)
            .unwrap_or(self.priority.len())
    }

    /// Every generator enabled; used for alternates.
    pub fn relaxed(&self) -> Self {
        Self {
            include_id: true,
            include_class: true,
            include_attributes: true,
            include_text: true,
            include_position: true,
            aria_label_fallback: true,
            unique: false,
            stable: false,
            ..self.clone()
        }
    }
}

/// Orchestrator timing and cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub original_timeout_ms: u64,
    pub alternative_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    /// Rewrite the locator in place when `resolve_locator` heals it
    pub self_heal: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            original_timeout_ms: 2_000,
            alternative_timeout_ms: 1_000,
            poll_interval_ms: 100,
            retry_backoff_ms: 1_000,
            max_retries: 3,
            cache_enabled: true,
            cache_ttl_ms: 300_000,
            self_heal: true,
        }
    }
}

impl ResolverSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Healing strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Priority overrides keyed by strategy name
    pub priorities: BTreeMap<String, i32>,
    pub disabled: Vec<String>,
    pub position_tolerance_px: f64,
    pub similarity_threshold: f64,
    pub max_hierarchy_depth: usize,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            priorities: BTreeMap::new(),
            disabled: Vec::new(),
            position_tolerance_px: 50.0,
            similarity_threshold: 0.3,
            max_hierarchy_depth: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub selector: SelectorOptions,
    pub resolver: ResolverSettings,
    pub strategies: StrategySettings,
}

impl LocatorConfig {
    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.resolver.poll_interval_ms == 0 {
            return Err(LocatorError::InvalidConfig(
                "resolver.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.strategies.similarity_threshold) {
            return Err(LocatorError::InvalidConfig(format!(
                "strategies.similarity_threshold must be within [0, 1], got {}",
                self.strategies.similarity_threshold
            )));
        }
        if self.strategies.position_tolerance_px < 0.0 {
            return Err(LocatorError::InvalidConfig(
                "strategies.position_tolerance_px must be >= 0".to_string(),
            ));
        }
        if !(1..=MAX_HIERARCHY_DEPTH).contains(&self.strategies.max_hierarchy_depth) {
            return Err(LocatorError::InvalidConfig(format!(
                "strategies.max_hierarchy_depth must be within [1, {}], got {}",
                MAX_HIERARCHY_DEPTH, self.strategies.max_hierarchy_depth
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<LocatorConfig, LocatorError> {
    let mut options = LoadOptions::default();
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    options.include_env = true;
    load_config_with_options(&options)
}

pub fn load_config_with_options(options: &LoadOptions) -> Result<LocatorConfig, LocatorError> {
    let vars: Vec<(String, String)> = if options.include_env {
        env::vars().collect()
    } else {
        Vec::new()
    };
    load_config_from(&options.paths, vars)
}

/// Loads from explicit files and an explicit variable set.
pub fn load_config_from<I>(paths: &[PathBuf], vars: I) -> Result<LocatorConfig, LocatorError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut value = serde_json::to_value(LocatorConfig::default())
        .map_err(|err| LocatorError::Config(format!("{}", err)))?;
    for path in paths {
        if path.exists() {
            debug!(path = %path.display(), "applying locator config file");
            merge_values(&mut value, read_yaml_value(path)?);
        }
    }
    apply_env_overlays(&mut value, ENV_PREFIX, vars);
    let config: LocatorConfig =
        serde_json::from_value(value).map_err(|err| LocatorError::Config(format!("{}", err)))?;
    config.validate()?;
    Ok(config)
}

/// Reads a YAML file into a JSON value.
pub fn read_yaml_value(path: &Path) -> Result<Value, LocatorError> {
    let content = fs::read_to_string(path)
        .map_err(|err| LocatorError::Config(format!("{}: {}", path.display(), err)))?;
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|err| LocatorError::Config(format!("{}: {}", path.display(), err)))?;
    serde_json::to_value(yaml_value).map_err(|err| LocatorError::Config(format!("{}", err)))
}

/// Deep-merges `overlay` into `base`; non-object values replace.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, Value::Null) if slot.is_object() => {}
        (slot, value) => *slot = value,
    }
}

/// Applies `PREFIX<SECTION>__<KEY>=value` variables as dotted-path overrides.
pub fn apply_env_overlays<I>(value: &mut Value, prefix: &str, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw) in vars {
        let Some(stripped) = key.strip_prefix(prefix) else {
            continue;
        };
        let path = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect::<Vec<_>>();
        if path.is_empty() {
            continue;
        }
        debug!(key = %key, "applying environment override");
        set_path(value, &path, parse_env_value(&raw));
    }
}

fn set_path(value: &mut Value, path: &[String], new_value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *value = new_value;
        return;
    };
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    if let Value::Object(map) = value {
        let slot = map.entry(head.clone()).or_insert(Value::Null);
        set_path(slot, rest, new_value);
    }
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    if raw.contains(',') {
        return Value::Array(
            raw.split(',')
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        );
    }
    Value::String(raw.to_string())
}

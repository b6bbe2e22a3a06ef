//! Application configuration: locator settings plus playback policy.

use std::env;
use std::path::{Path, PathBuf};

use action_locator::config::{apply_env_overlays, merge_values, read_yaml_value, ENV_PREFIX};
use action_locator::LocatorConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::PlaybackError;
use crate::replay::PlaybackPolicy;

/// Environment prefix for playback overrides, e.g. `LOCATOR__PLAYBACK__ON_FAILURE=continue`.
pub const PLAYBACK_ENV_PREFIX: &str = "LOCATOR__PLAYBACK__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub locator: LocatorConfig,
    pub playback: PlaybackPolicy,
}

/// Config file candidates: `--config`, then `./config/locator.yaml`, then
/// `<user config dir>/locator/config.yaml`. The first existing file wins.
pub fn config_search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut paths = vec![PathBuf::from("config/locator.yaml")];
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("locator");
        dir.push("config.yaml");
        paths.push(dir);
    }
    paths
}

pub fn load_app_config(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>), PlaybackError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(PlaybackError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
    }
    let source = config_search_paths(explicit)
        .into_iter()
        .find(|path| path.exists());
    let config = load_app_config_from(source.as_deref(), env::vars())?;
    match &source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    Ok((config, source))
}

/// File overlay then environment overlay on top of the defaults.
pub fn load_app_config_from<I>(path: Option<&Path>, vars: I) -> Result<AppConfig, PlaybackError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut value = serde_json::to_value(AppConfig::default())
        .map_err(|err| PlaybackError::Config(err.to_string()))?;
    if let Some(path) = path {
        let file = read_yaml_value(path).map_err(|err| PlaybackError::Config(err.to_string()))?;
        merge_values(&mut value, file);
    }

    let (playback_vars, locator_vars): (Vec<_>, Vec<_>) = vars
        .into_iter()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .partition(|(key, _)| key.starts_with(PLAYBACK_ENV_PREFIX));
    if let Value::Object(sections) = &mut value {
        if let Some(locator) = sections.get_mut("locator") {
            apply_env_overlays(locator, ENV_PREFIX, locator_vars);
        }
        if let Some(playback) = sections.get_mut("playback") {
            apply_env_overlays(playback, PLAYBACK_ENV_PREFIX, playback_vars);
        }
    }

    let config: AppConfig =
        serde_json::from_value(value).map_err(|err| PlaybackError::Config(err.to_string()))?;
    config.locator.validate()?;
    config.playback.validate()?;
    Ok(config)
}

//! Snapshot and locator file helpers shared by the subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use element_tree::{ElementTree, MemoryTree};
use locator_core_types::ElementHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::debug;

/// Loads a JSON element snapshot (a nested `MemoryElement`).
pub async fn load_tree(path: &Path) -> Result<Arc<MemoryTree>> {
    let json = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let tree = MemoryTree::from_json_str(&json)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    debug!(path = %path.display(), elements = tree.len(), "loaded snapshot");
    Ok(Arc::new(tree))
}

/// First element matching `selector`; errors when nothing matches.
pub async fn find_target(tree: &MemoryTree, selector: &str) -> Result<ElementHandle> {
    match tree
        .find(selector)
        .await
        .with_context(|| format!("Invalid target selector '{}'", selector))?
    {
        Some(element) => Ok(element),
        None => bail!("Target '{}' matches no element in the snapshot", selector),
    }
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

//! Poll-with-sleep wait for a selector to appear.

use std::time::Duration;

use element_tree::{ElementTree, TreeError};
use locator_core_types::ElementHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::LocatorError;

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Found(ElementHandle),
    TimedOut,
    /// Selector rejected by the tree; waiting longer cannot help
    Invalid(TreeError),
}

/// Polls `find` until it returns an element, the timeout elapses, or the
/// token is cancelled. At least one query is always made.
pub async fn wait_for_element(
    tree: &dyn ElementTree,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<WaitOutcome, LocatorError> {
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(LocatorError::Cancelled);
        }
        match tree.find(selector).await {
            Ok(Some(element)) => return Ok(WaitOutcome::Found(element)),
            Ok(None) => {}
            Err(err) if err.is_invalid_selector() => {
                debug!("Selector '{}' rejected: {}", selector, err);
                return Ok(WaitOutcome::Invalid(err));
            }
            Err(err) => debug!("Transient query failure for '{}': {}", selector, err),
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(WaitOutcome::TimedOut);
        }
        let nap = poll_interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => return Err(LocatorError::Cancelled),
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

/// Sleep that returns `Cancelled` as soon as the token fires.
pub async fn cancellable_sleep(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), LocatorError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(LocatorError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

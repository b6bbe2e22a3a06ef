//! Error types for the locator

use element_tree::TreeError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Candidate generation produced nothing usable for the element
    #[error("No selector generated: {0}")]
    NoSelectorGenerated(String),

    /// Element handle is detached or otherwise unusable
    #[error("Element invalid: {0}")]
    ElementInvalid(String),

    /// Element tree query failed
    #[error("Tree query failed: {0}")]
    Tree(#[from] TreeError),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Session abort flag was raised
    #[error("Resolution cancelled")]
    Cancelled,

    /// Configuration could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::Tree(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::InvalidConfig(_) | LocatorError::Config(_) => 3,
            LocatorError::Tree(_) => 2,
            LocatorError::NoSelectorGenerated(_) | LocatorError::ElementInvalid(_) => 1,
            LocatorError::Cancelled => 0,
        }
    }

    /// Maps a detached handle to [`LocatorError::ElementInvalid`].
    pub(crate) fn from_element_query(err: TreeError) -> Self {
        match err {
            TreeError::Detached(handle) => LocatorError::ElementInvalid(handle),
            other => LocatorError::Tree(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_follows_tree_error() {
        assert!(LocatorError::Tree(TreeError::Backend("socket closed".into())).is_retryable());
        assert!(!LocatorError::Tree(TreeError::invalid("a[", "unterminated")).is_retryable());
        assert!(!LocatorError::Cancelled.is_retryable());
    }

    #[test]
    fn test_detached_maps_to_element_invalid() {
        let err = LocatorError::from_element_query(TreeError::Detached("node-4".into()));
        assert!(matches!(err, LocatorError::ElementInvalid(ref h) if h == "node-4"));
        assert_eq!(err.severity(), 1);
    }
}

//! Error types for element tree queries

use thiserror::Error;

/// Failure reported by an element tree backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    /// Selector text was rejected by the backend; retrying cannot help
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Handle no longer refers to an element in the tree
    #[error("Element detached: {0}")]
    Detached(String),

    /// Transport or engine failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl TreeError {
    pub fn invalid(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Only backend hiccups are worth polling again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TreeError::Backend(_))
    }

    pub fn is_invalid_selector(&self) -> bool {
        matches!(self, TreeError::InvalidSelector { .. })
    }
}

//! Playback error types

use action_locator::LocatorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Resolution failed outside the normal "not found" result
    #[error("Locator error: {0}")]
    Locator(#[from] LocatorError),

    /// The dispatcher could not perform the step's interaction
    #[error("Dispatch failed for step '{step}': {message}")]
    Dispatch { step: String, message: String },

    /// A diagnostic artifact could not be stored
    #[error("Diagnostic capture failed: {0}")]
    Diagnostics(String),

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl PlaybackError {
    pub fn dispatch(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PlaybackError::Locator(err) => err.is_retryable(),
            PlaybackError::Dispatch { .. } => true,
            _ => false,
        }
    }
}

use action_locator::ResolutionResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PlaybackError;

/// Evidence captured for a failed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticArtifact {
    pub recording: String,
    pub step_index: usize,
    pub step_name: String,
    pub selector: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionResult>,
    pub timestamp_ms: i64,
}

/// Receives diagnostic artifacts (screenshots, DOM dumps, ...) for failed steps.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn capture(&self, artifact: DiagnosticArtifact) -> Result<(), PlaybackError>;
}

/// Keeps artifacts in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnosticSink {
    artifacts: Mutex<Vec<DiagnosticArtifact>>,
}

impl MemoryDiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<DiagnosticArtifact> {
        self.artifacts.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }
}

#[async_trait]
impl DiagnosticSink for MemoryDiagnosticSink {
    async fn capture(&self, artifact: DiagnosticArtifact) -> Result<(), PlaybackError> {
        debug!(
            step = artifact.step_index,
            selector = %artifact.selector,
            "captured diagnostic artifact"
        );
        self.artifacts.lock().push(artifact);
        Ok(())
    }
}

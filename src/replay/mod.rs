//! Recording playback on top of the resolution orchestrator.
//!
//! The runner resolves each step's locator, hands the resolved element to a
//! [`StepDispatcher`] and applies the [`PlaybackPolicy`] when a step fails.
//! Healing itself stays in the orchestrator.

pub mod diagnostics;

pub use diagnostics::{DiagnosticArtifact, DiagnosticSink, MemoryDiagnosticSink};

use std::sync::Arc;
use std::time::{Duration, Instant};

use action_locator::{ElementLocator, LocatorError, ResolutionOrchestrator, ResolutionResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::PlaybackError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    #[default]
    Abort,
    Continue,
}

/// What the runner does around each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackPolicy {
    pub on_failure: FailureMode,
    pub capture_diagnostics: bool,
    /// Upper bound for resolving and dispatching one step
    pub step_timeout_ms: u64,
    /// Resolved steps below this confidence count as failures
    pub min_confidence: f64,
    /// Write heals back into the in-memory recording
    pub persist_heals: bool,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self {
            on_failure: FailureMode::Abort,
            capture_diagnostics: true,
            step_timeout_ms: 30_000,
            min_confidence: 0.3,
            persist_heals: false,
        }
    }
}

impl PlaybackPolicy {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.step_timeout_ms == 0 {
            return Err(PlaybackError::Config(
                "playback.step_timeout_ms must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(PlaybackError::Config(format!(
                "playback.min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    #[default]
    Click,
    Type {
        text: String,
    },
    Hover,
    /// Only checks that the element resolves
    Assert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStep {
    pub name: String,
    #[serde(default)]
    pub action: StepAction,
    pub locator: ElementLocator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<PlaybackStep>,
}

impl Recording {
    pub fn validate(&self) -> Result<(), PlaybackError> {
        for (index, step) in self.steps.iter().enumerate() {
            if step.locator.primary_selector.trim().is_empty() {
                return Err(PlaybackError::InvalidRecording(format!(
                    "step {} ('{}') has an empty primary selector",
                    index, step.name
                )));
            }
        }
        Ok(())
    }
}

/// Performs the recorded interaction on a resolved element.
#[async_trait]
pub trait StepDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        step: &PlaybackStep,
        resolution: &ResolutionResult,
    ) -> Result<(), PlaybackError>;
}

/// Dispatcher that only logs the interaction; used for dry runs against
/// snapshots.
#[derive(Debug, Default, Clone)]
pub struct TracingDispatcher;

#[async_trait]
impl StepDispatcher for TracingDispatcher {
    async fn dispatch(
        &self,
        step: &PlaybackStep,
        resolution: &ResolutionResult,
    ) -> Result<(), PlaybackError> {
        let Some(element) = resolution.element else {
            return Err(PlaybackError::dispatch(&step.name, "no element"));
        };
        info!(
            step = %step.name,
            action = ?step.action,
            selector = %resolution.selector,
            "dispatching to {}",
            element
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Healed,
    Failed,
    TimedOut,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub time_taken_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub recording: String,
    pub outcomes: Vec<StepOutcome>,
    pub aborted: bool,
    pub healed_steps: usize,
}

impl PlaybackReport {
    pub fn count(&self, status: StepStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Every step passed or healed.
    pub fn is_success(&self) -> bool {
        !self.aborted
            && self
                .outcomes
                .iter()
                .all(|o| matches!(o.status, StepStatus::Passed | StepStatus::Healed))
    }
}

/// Why a step did not complete.
struct StepFailure {
    reason: String,
    resolution: Option<ResolutionResult>,
    cancelled: bool,
}

impl StepFailure {
    fn new(reason: impl Into<String>, resolution: Option<ResolutionResult>) -> Self {
        Self {
            reason: reason.into(),
            resolution,
            cancelled: false,
        }
    }
}

pub struct PlaybackRunner {
    orchestrator: Arc<ResolutionOrchestrator>,
    dispatcher: Arc<dyn StepDispatcher>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    policy: PlaybackPolicy,
}

impl PlaybackRunner {
    pub fn new(
        orchestrator: Arc<ResolutionOrchestrator>,
        dispatcher: Arc<dyn StepDispatcher>,
        policy: PlaybackPolicy,
    ) -> Self {
        Self {
            orchestrator,
            dispatcher,
            diagnostics: None,
            policy,
        }
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn policy(&self) -> &PlaybackPolicy {
        &self.policy
    }

    /// Plays every step in order. Steps after an abort are reported as
    /// skipped; heals are written back only with `persist_heals`.
    pub async fn run(&self, recording: &mut Recording) -> Result<PlaybackReport, PlaybackError> {
        recording.validate()?;
        info!(
            "Replaying '{}' ({} steps)",
            recording.name,
            recording.steps.len()
        );

        let max_alternatives = self.orchestrator.generator().options().max_alternatives;
        let mut report = PlaybackReport {
            recording: recording.name.clone(),
            ..PlaybackReport::default()
        };

        for (index, step) in recording.steps.iter_mut().enumerate() {
            if report.aborted {
                report.outcomes.push(StepOutcome {
                    index,
                    name: step.name.clone(),
                    status: StepStatus::Skipped,
                    selector: None,
                    strategy: None,
                    confidence: 0.0,
                    message: None,
                    time_taken_ms: 0,
                });
                continue;
            }

            let started = Instant::now();
            let attempt =
                tokio::time::timeout(self.policy.step_timeout(), self.execute(step)).await;
            let elapsed = started.elapsed().as_millis() as u64;

            let outcome = match attempt {
                Ok(Ok(result)) => {
                    let healed = result.metadata.healing_applied;
                    if healed {
                        report.healed_steps += 1;
                        if self.policy.persist_heals
                            && step.locator.apply_heal(&result.selector, max_alternatives)
                        {
                            info!(
                                "Step '{}' now uses '{}'",
                                step.name, step.locator.primary_selector
                            );
                        }
                    }
                    debug!("Step {} '{}' completed via {}", index, step.name, result.strategy);
                    StepOutcome {
                        index,
                        name: step.name.clone(),
                        status: if healed {
                            StepStatus::Healed
                        } else {
                            StepStatus::Passed
                        },
                        selector: Some(result.selector),
                        strategy: Some(result.strategy),
                        confidence: result.confidence,
                        message: None,
                        time_taken_ms: elapsed,
                    }
                }
                Ok(Err(failure)) => {
                    if failure.cancelled {
                        report.aborted = true;
                    }
                    self.fail(
                        &recording.name,
                        index,
                        step,
                        StepStatus::Failed,
                        failure,
                        elapsed,
                        &mut report,
                    )
                    .await
                }
                Err(_) => {
                    let failure = StepFailure::new(
                        format!("step exceeded {} ms", self.policy.step_timeout_ms),
                        None,
                    );
                    self.fail(
                        &recording.name,
                        index,
                        step,
                        StepStatus::TimedOut,
                        failure,
                        elapsed,
                        &mut report,
                    )
                    .await
                }
            };
            report.outcomes.push(outcome);
        }

        info!(
            "Replay '{}' finished: {} passed, {} healed, {} failed{}",
            report.recording,
            report.count(StepStatus::Passed),
            report.count(StepStatus::Healed),
            report.count(StepStatus::Failed) + report.count(StepStatus::TimedOut),
            if report.aborted { " (aborted)" } else { "" }
        );
        Ok(report)
    }

    async fn execute(&self, step: &PlaybackStep) -> Result<ResolutionResult, StepFailure> {
        let options = self
            .orchestrator
            .default_options()
            .with_alternatives(step.locator.alternative_selectors.clone());
        let result = match self
            .orchestrator
            .resolve(&step.locator.primary_selector, &step.locator.fingerprint, &options)
            .await
        {
            Ok(result) => result,
            Err(LocatorError::Cancelled) => {
                return Err(StepFailure {
                    reason: "replay cancelled".to_string(),
                    resolution: None,
                    cancelled: true,
                })
            }
            Err(err) => return Err(StepFailure::new(err.to_string(), None)),
        };

        if !result.is_resolved() {
            return Err(StepFailure::new("no element resolved", Some(result)));
        }
        if result.confidence < self.policy.min_confidence {
            return Err(StepFailure::new(
                format!(
                    "confidence {:.2} below minimum {:.2}",
                    result.confidence, self.policy.min_confidence
                ),
                Some(result),
            ));
        }
        if let Err(err) = self.dispatcher.dispatch(step, &result).await {
            return Err(StepFailure::new(err.to_string(), Some(result)));
        }
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn fail(
        &self,
        recording: &str,
        index: usize,
        step: &PlaybackStep,
        status: StepStatus,
        failure: StepFailure,
        elapsed: u64,
        report: &mut PlaybackReport,
    ) -> StepOutcome {
        warn!("Step {} '{}' failed: {}", index, step.name, failure.reason);

        if self.policy.capture_diagnostics {
            if let Some(sink) = &self.diagnostics {
                let artifact = DiagnosticArtifact {
                    recording: recording.to_string(),
                    step_index: index,
                    step_name: step.name.clone(),
                    selector: step.locator.primary_selector.clone(),
                    reason: failure.reason.clone(),
                    resolution: failure.resolution.clone(),
                    timestamp_ms: Utc::now().timestamp_millis(),
                };
                if let Err(err) = sink.capture(artifact).await {
                    warn!("Could not capture diagnostics for step {}: {}", index, err);
                }
            }
        }

        if self.policy.on_failure == FailureMode::Abort {
            report.aborted = true;
        }

        StepOutcome {
            index,
            name: step.name.clone(),
            status,
            selector: failure.resolution.as_ref().map(|r| r.selector.clone()),
            strategy: failure.resolution.as_ref().map(|r| r.strategy.clone()),
            confidence: failure.resolution.as_ref().map_or(0.0, |r| r.confidence),
            message: Some(failure.reason),
            time_taken_ms: elapsed,
        }
    }
}

use std::sync::Arc;

use action_locator::{
    ElementLocator, FingerprintBuilder, LocatorConfig, ResolutionOrchestrator, ResolutionResult,
};
use async_trait::async_trait;
use element_tree::{ElementTree, MemoryElement, MemoryTree};
use locator_cli::replay::{
    FailureMode, MemoryDiagnosticSink, PlaybackPolicy, PlaybackRunner, PlaybackStep, Recording,
    StepAction, StepDispatcher, StepStatus,
};
use locator_cli::PlaybackError;
use parking_lot::Mutex;

fn signup_page() -> Arc<MemoryTree> {
    Arc::new(MemoryTree::from_root(
        MemoryElement::new("html").child(
            MemoryElement::new("body").rect(0.0, 0.0, 1024.0, 768.0).child(
                MemoryElement::new("form")
                    .class("signup")
                    .rect(100.0, 100.0, 400.0, 300.0)
                    .child(
                        MemoryElement::new("input")
                            .id("email")
                            .attr("name", "email")
                            .rect(120.0, 120.0, 200.0, 30.0),
                    )
                    .child(
                        MemoryElement::new("button")
                            .id("signup-btn")
                            .class("primary")
                            .text("Create account")
                            .rect(120.0, 200.0, 140.0, 40.0),
                    )
                    .child(
                        MemoryElement::new("a")
                            .id("terms")
                            .text("Terms of service")
                            .rect(120.0, 260.0, 120.0, 20.0),
                    ),
            ),
        ),
    ))
}

fn fast_config() -> LocatorConfig {
    let mut config = LocatorConfig::default();
    config.resolver.original_timeout_ms = 20;
    config.resolver.alternative_timeout_ms = 10;
    config.resolver.poll_interval_ms = 5;
    config.resolver.retry_backoff_ms = 5;
    config.resolver.max_retries = 1;
    config
}

async fn step(tree: &MemoryTree, name: &str, selector: &str, action: StepAction) -> PlaybackStep {
    let element = tree.find(selector).await.unwrap().unwrap();
    let fingerprint = FingerprintBuilder::default()
        .capture(tree, element)
        .await
        .unwrap();
    PlaybackStep {
        name: name.to_string(),
        action,
        locator: ElementLocator::new(selector, Vec::new(), fingerprint),
    }
}

async fn signup_recording(tree: &MemoryTree) -> Recording {
    Recording {
        name: "signup".to_string(),
        steps: vec![
            step(
                tree,
                "fill email",
                "#email",
                StepAction::Type {
                    text: "a@b.c".into(),
                },
            )
            .await,
            step(tree, "submit", "#signup-btn", StepAction::Click).await,
            step(tree, "open terms", "#terms", StepAction::Click).await,
        ],
    }
}

#[derive(Default)]
struct RecordingDispatcher {
    seen: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

#[async_trait]
impl StepDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        step: &PlaybackStep,
        resolution: &ResolutionResult,
    ) -> Result<(), PlaybackError> {
        if self.fail_on.as_deref() == Some(step.name.as_str()) {
            return Err(PlaybackError::dispatch(&step.name, "element not interactable"));
        }
        self.seen.lock().push(resolution.selector.clone());
        Ok(())
    }
}

fn runner(
    tree: &Arc<MemoryTree>,
    dispatcher: Arc<RecordingDispatcher>,
    policy: PlaybackPolicy,
) -> (PlaybackRunner, Arc<MemoryDiagnosticSink>) {
    let orchestrator = Arc::new(ResolutionOrchestrator::new(tree.clone(), &fast_config()));
    let sink = Arc::new(MemoryDiagnosticSink::new());
    let runner = PlaybackRunner::new(orchestrator, dispatcher, policy).with_diagnostics(sink.clone());
    (runner, sink)
}

#[tokio::test]
async fn unchanged_page_passes_every_step() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (runner, sink) = runner(&tree, dispatcher.clone(), PlaybackPolicy::default());

    let report = runner.run(&mut recording).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.count(StepStatus::Passed), 3);
    assert_eq!(report.healed_steps, 0);
    assert_eq!(
        *dispatcher.seen.lock(),
        vec!["#email", "#signup-btn", "#terms"]
    );
    assert!(sink.is_empty());
}

#[tokio::test]
async fn healed_step_is_reported_but_not_persisted_by_default() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    let button = tree.find("#signup-btn").await.unwrap().unwrap();
    tree.remove_attribute(button, "id").unwrap();

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (runner, _) = runner(&tree, dispatcher, PlaybackPolicy::default());
    let report = runner.run(&mut recording).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.healed_steps, 1);
    let healed = &report.outcomes[1];
    assert_eq!(healed.status, StepStatus::Healed);
    assert_eq!(healed.strategy.as_deref(), Some("text"));
    assert_eq!(recording.steps[1].locator.primary_selector, "#signup-btn");
}

#[tokio::test]
async fn persist_heals_rewrites_the_recording() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    let button = tree.find("#signup-btn").await.unwrap().unwrap();
    tree.remove_attribute(button, "id").unwrap();

    let policy = PlaybackPolicy {
        persist_heals: true,
        ..PlaybackPolicy::default()
    };
    let (runner, _) = runner(&tree, Arc::new(RecordingDispatcher::default()), policy);
    let report = runner.run(&mut recording).await.unwrap();

    let locator = &recording.steps[1].locator;
    assert_eq!(Some(&locator.primary_selector), report.outcomes[1].selector.as_ref());
    assert_eq!(locator.alternative_selectors, vec!["#signup-btn"]);
}

#[tokio::test]
async fn failure_aborts_and_skips_the_rest() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    let button = tree.find("#signup-btn").await.unwrap().unwrap();
    tree.remove(button).unwrap();

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (runner, sink) = runner(&tree, dispatcher.clone(), PlaybackPolicy::default());
    let report = runner.run(&mut recording).await.unwrap();

    assert!(report.aborted);
    let statuses: Vec<StepStatus> = report.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Passed, StepStatus::Failed, StepStatus::Skipped]
    );
    assert_eq!(dispatcher.seen.lock().len(), 1);

    let artifacts = sink.artifacts();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].step_index, 1);
    let resolution = artifacts[0].resolution.as_ref().unwrap();
    assert_eq!(resolution.strategy, ResolutionResult::STRATEGY_FAILED);
    assert!(resolution.element.is_none());
}

#[tokio::test]
async fn continue_mode_runs_remaining_steps() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    let button = tree.find("#signup-btn").await.unwrap().unwrap();
    tree.remove(button).unwrap();

    let policy = PlaybackPolicy {
        on_failure: FailureMode::Continue,
        capture_diagnostics: false,
        ..PlaybackPolicy::default()
    };
    let (runner, sink) = runner(&tree, Arc::new(RecordingDispatcher::default()), policy);
    let report = runner.run(&mut recording).await.unwrap();

    assert!(!report.aborted);
    assert!(!report.is_success());
    assert_eq!(report.count(StepStatus::Passed), 2);
    assert_eq!(report.count(StepStatus::Failed), 1);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn low_confidence_heal_counts_as_failure() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    let button = tree.find("#signup-btn").await.unwrap().unwrap();
    tree.remove_attribute(button, "id").unwrap();

    let policy = PlaybackPolicy {
        min_confidence: 0.8,
        on_failure: FailureMode::Continue,
        ..PlaybackPolicy::default()
    };
    let (runner, _) = runner(&tree, Arc::new(RecordingDispatcher::default()), policy);
    let report = runner.run(&mut recording).await.unwrap();

    let outcome = &report.outcomes[1];
    assert_eq!(outcome.status, StepStatus::Failed);
    assert_eq!(outcome.confidence, 0.7);
    assert!(outcome.message.as_deref().unwrap().contains("below minimum"));
}

#[tokio::test]
async fn dispatcher_error_fails_the_step() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    let dispatcher = Arc::new(RecordingDispatcher {
        fail_on: Some("submit".to_string()),
        ..RecordingDispatcher::default()
    });
    let (runner, _) = runner(&tree, dispatcher, PlaybackPolicy::default());
    let report = runner.run(&mut recording).await.unwrap();

    assert_eq!(report.outcomes[1].status, StepStatus::Failed);
    assert!(report.outcomes[1]
        .message
        .as_deref()
        .unwrap()
        .contains("not interactable"));
    assert_eq!(report.outcomes[2].status, StepStatus::Skipped);
}

#[tokio::test]
async fn slow_step_times_out() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    recording.steps[0].locator.primary_selector = "#missing".to_string();

    let mut config = fast_config();
    config.resolver.original_timeout_ms = 10_000;
    let orchestrator = Arc::new(ResolutionOrchestrator::new(tree.clone(), &config));
    let policy = PlaybackPolicy {
        step_timeout_ms: 50,
        ..PlaybackPolicy::default()
    };
    let runner = PlaybackRunner::new(
        orchestrator,
        Arc::new(RecordingDispatcher::default()),
        policy,
    );
    let report = runner.run(&mut recording).await.unwrap();

    assert_eq!(report.outcomes[0].status, StepStatus::TimedOut);
    assert!(report.aborted);
    assert_eq!(report.count(StepStatus::Skipped), 2);
}

#[tokio::test]
async fn cancelled_orchestrator_aborts_replay() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    let orchestrator = Arc::new(ResolutionOrchestrator::new(tree.clone(), &fast_config()));
    orchestrator.abort_handle().cancel();

    let policy = PlaybackPolicy {
        on_failure: FailureMode::Continue,
        ..PlaybackPolicy::default()
    };
    let runner = PlaybackRunner::new(
        orchestrator,
        Arc::new(RecordingDispatcher::default()),
        policy,
    );
    let report = runner.run(&mut recording).await.unwrap();

    assert!(report.aborted);
    assert_eq!(report.outcomes[0].status, StepStatus::Failed);
    assert_eq!(report.count(StepStatus::Skipped), 2);
}

#[tokio::test]
async fn empty_primary_selector_is_rejected() {
    let tree = signup_page();
    let mut recording = signup_recording(&tree).await;
    recording.steps[2].locator.primary_selector = "  ".to_string();
    let (runner, _) = runner(
        &tree,
        Arc::new(RecordingDispatcher::default()),
        PlaybackPolicy::default(),
    );
    assert!(matches!(
        runner.run(&mut recording).await,
        Err(PlaybackError::InvalidRecording(_))
    ));
}

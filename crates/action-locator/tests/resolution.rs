use std::sync::Arc;
use std::time::Duration;

use action_locator::strategies::tree_analysis::similarity;
use action_locator::strategies::{
    FuzzyStrategy, HierarchyStrategy, PositionStrategy, TreeAnalysisStrategy,
};
use action_locator::{
    CandidateGenerator, ElementFingerprint, ElementLocator, FingerprintBuilder, HealingStrategy,
    LocatorConfig, LocatorError, ResolutionOrchestrator, ResolutionResult, StrategyRegistry,
};
use element_tree::{ElementTree, MemoryElement, MemoryTree};
use locator_core_types::{BoundingBox, SequentialIdSource};

fn login_page() -> Arc<MemoryTree> {
    Arc::new(MemoryTree::from_root(
        MemoryElement::new("html").child(
            MemoryElement::new("body")
                .rect(0.0, 0.0, 1024.0, 768.0)
                .child(
                    MemoryElement::new("div")
                        .class("header")
                        .rect(0.0, 0.0, 1024.0, 60.0)
                        .child(MemoryElement::new("a").text("Home").rect(10.0, 10.0, 60.0, 20.0)),
                )
                .child(
                    MemoryElement::new("form")
                        .class("login")
                        .rect(100.0, 100.0, 400.0, 300.0)
                        .child(
                            MemoryElement::new("input")
                                .attr("name", "username")
                                .attr("placeholder", "Username")
                                .rect(120.0, 120.0, 200.0, 30.0),
                        )
                        .child(
                            MemoryElement::new("button")
                                .id("login-btn")
                                .class("primary")
                                .attr("type", "submit")
                                .text("Sign In")
                                .rect(120.0, 200.0, 100.0, 40.0),
                        )
                        .child(
                            MemoryElement::new("button")
                                .class("secondary")
                                .text("Cancel")
                                .rect(240.0, 200.0, 100.0, 40.0),
                        ),
                ),
        ),
    ))
}

fn fast_config() -> LocatorConfig {
    let mut config = LocatorConfig::default();
    config.resolver.original_timeout_ms = 30;
    config.resolver.alternative_timeout_ms = 15;
    config.resolver.poll_interval_ms = 5;
    config.resolver.retry_backoff_ms = 5;
    config.resolver.max_retries = 2;
    config
}

fn orchestrator(tree: &Arc<MemoryTree>) -> ResolutionOrchestrator {
    ResolutionOrchestrator::new(tree.clone(), &fast_config())
        .with_id_source(Arc::new(SequentialIdSource::seeded(11)))
}

/// Orchestrator whose cascade is `strategy` alone.
fn only(tree: &Arc<MemoryTree>, strategy: Arc<dyn HealingStrategy>) -> ResolutionOrchestrator {
    let mut registry = StrategyRegistry::new();
    registry.register(strategy);
    orchestrator(tree).with_registry(registry)
}

async fn login_fingerprint(tree: &MemoryTree) -> ElementFingerprint {
    let button = tree.find("#login-btn").await.unwrap().unwrap();
    FingerprintBuilder::default()
        .capture(tree, button)
        .await
        .unwrap()
}

/// Simulates a re-render that dropped the button's id.
async fn drop_login_id(tree: &MemoryTree) {
    let button = tree.find("#login-btn").await.unwrap().unwrap();
    tree.remove_attribute(button, "id").unwrap();
}

#[tokio::test]
async fn original_selector_resolves_with_full_confidence() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let orchestrator = orchestrator(&tree);
    let result = orchestrator
        .resolve("#login-btn", &fingerprint, &orchestrator.default_options())
        .await
        .unwrap();
    assert_eq!(result.strategy, ResolutionResult::STRATEGY_ORIGINAL);
    assert_eq!(result.confidence, 1.0);
    assert_eq!(result.metadata.attempts, 1);
    assert!(!result.metadata.fallback_used);
    assert!(result.id.starts_with("res-1-"));
}

#[tokio::test]
async fn second_resolve_is_served_from_cache() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let orchestrator = orchestrator(&tree);
    let options = orchestrator.default_options();

    let first = orchestrator
        .resolve("#login-btn", &fingerprint, &options)
        .await
        .unwrap();
    let second = orchestrator
        .resolve("#login-btn", &fingerprint, &options)
        .await
        .unwrap();

    assert!(!first.metadata.from_cache);
    assert!(second.metadata.from_cache);
    assert_eq!(first.id, second.id);
    assert_eq!(first.selector, second.selector);
    assert_eq!(first.element, second.element);
    assert_eq!(orchestrator.cache().stats().hits, 1);
}

#[tokio::test]
async fn stale_cache_entry_is_evicted() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let orchestrator = orchestrator(&tree);
    let options = orchestrator.default_options();
    orchestrator
        .resolve("#login-btn", &fingerprint, &options)
        .await
        .unwrap();

    let button = tree.find("#login-btn").await.unwrap().unwrap();
    tree.remove(button).unwrap();

    let result = orchestrator
        .resolve("#login-btn", &fingerprint, &options)
        .await
        .unwrap();
    assert!(!result.is_resolved());
    assert!(!result.metadata.from_cache);
    assert_eq!(result.strategy, ResolutionResult::STRATEGY_FAILED);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(orchestrator.cache().stats().evictions, 1);
    assert!(orchestrator.cache().is_empty());
}

#[tokio::test]
async fn recorded_alternate_is_used_before_healing() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let orchestrator = orchestrator(&tree);
    let options = orchestrator
        .default_options()
        .with_alternatives(vec!["#gone".into(), "form.login > button.primary".into()]);

    let result = orchestrator
        .resolve("#old-login", &fingerprint, &options)
        .await
        .unwrap();
    assert_eq!(result.strategy, ResolutionResult::STRATEGY_ALTERNATIVE);
    assert_eq!(result.selector, "form.login > button.primary");
    assert_eq!(result.confidence, 0.8);
    assert!(result.metadata.fallback_used);
    assert!(!result.metadata.healing_applied);
    assert_eq!(result.metadata.attempts, 3);
    assert_eq!(result.alternatives, vec!["#old-login", "#gone"]);
}

#[tokio::test]
async fn dropped_id_heals_through_text() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    drop_login_id(&tree).await;
    let orchestrator = orchestrator(&tree);

    let result = orchestrator
        .resolve("#login-btn", &fingerprint, &orchestrator.default_options())
        .await
        .unwrap();
    assert_eq!(result.strategy, "text");
    assert_eq!(result.confidence, 0.7);
    assert!(result.metadata.healing_applied);
    assert_eq!(result.selector, "button:has-text(\"Sign In\")");
    let text = tree.text(result.element.unwrap()).await.unwrap();
    assert_eq!(text, "Sign In");

    let heal = orchestrator.history().latest("#login-btn").unwrap();
    assert_eq!(heal.healed, result.selector);
    assert_eq!(heal.strategy, "text");
}

#[tokio::test]
async fn cascade_follows_registry_priority() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    drop_login_id(&tree).await;

    let mut orchestrator = orchestrator(&tree);
    assert!(orchestrator.registry_mut().set_priority("attribute", 95));
    let result = orchestrator
        .resolve("#login-btn", &fingerprint, &orchestrator.default_options())
        .await
        .unwrap();
    assert_eq!(result.strategy, "attribute");
    assert_eq!(result.selector, "button.primary");
    assert_eq!(result.confidence, 0.6);
}

#[tokio::test]
async fn exhausted_cascade_returns_failed_result() {
    let tree = login_page();
    let mut fingerprint = login_fingerprint(&tree).await;
    fingerprint.tag_name = "select".into();
    let orchestrator = orchestrator(&tree);

    let result = orchestrator
        .resolve("#country", &fingerprint, &orchestrator.default_options())
        .await
        .unwrap();
    assert!(!result.is_resolved());
    assert_eq!(result.strategy, ResolutionResult::STRATEGY_FAILED);
    assert_eq!(result.confidence, 0.0);
    // original + two rounds of six strategies
    assert_eq!(result.metadata.attempts, 13);
    assert!(orchestrator.history().is_empty());
    assert!(orchestrator.cache().is_empty());
}

#[tokio::test]
async fn resolve_locator_commits_heal() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    drop_login_id(&tree).await;
    let orchestrator = orchestrator(&tree);

    let mut locator = ElementLocator::new("#login-btn", Vec::new(), fingerprint);
    let result = orchestrator.resolve_locator(&mut locator).await.unwrap();
    assert!(result.metadata.healing_applied);
    assert_eq!(locator.primary_selector, result.selector);
    assert_eq!(locator.alternative_selectors, vec!["#login-btn"]);
}

#[tokio::test]
async fn resolve_locator_keeps_primary_when_alternate_matches() {
    let tree = login_page();
    let button = tree.find("#login-btn").await.unwrap().unwrap();
    let mut locator = CandidateGenerator::default()
        .build_locator(tree.as_ref(), button)
        .await
        .unwrap();
    assert_eq!(locator.primary_selector, "#login-btn");
    drop_login_id(&tree).await;

    let orchestrator = orchestrator(&tree);
    let result = orchestrator.resolve_locator(&mut locator).await.unwrap();
    assert_eq!(result.strategy, ResolutionResult::STRATEGY_ALTERNATIVE);
    assert_eq!(result.element, Some(button));
    assert_eq!(locator.primary_selector, "#login-btn");
}

#[tokio::test]
async fn abort_flag_cancels_resolution() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let orchestrator = orchestrator(&tree);
    orchestrator.abort_handle().cancel();

    let err = orchestrator
        .resolve("#login-btn", &fingerprint, &orchestrator.default_options())
        .await
        .unwrap_err();
    assert!(matches!(err, LocatorError::Cancelled));
}

#[tokio::test]
async fn abort_interrupts_a_long_wait() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let orchestrator = orchestrator(&tree);
    let mut options = orchestrator.default_options();
    options.original_timeout_ms = 60_000;

    let abort = orchestrator.abort_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        abort.cancel();
    });
    let started = std::time::Instant::now();
    let err = orchestrator
        .resolve("#missing", &fingerprint, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, LocatorError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

fn checkout_page() -> Arc<MemoryTree> {
    Arc::new(MemoryTree::from_root(
        MemoryElement::new("html").child(
            MemoryElement::new("body").rect(0.0, 0.0, 1024.0, 768.0).child(
                MemoryElement::new("main")
                    .id("app")
                    .rect(0.0, 0.0, 1024.0, 768.0)
                    .child(
                        MemoryElement::new("section")
                            .class("checkout")
                            .rect(0.0, 100.0, 600.0, 400.0)
                            .child(
                                MemoryElement::new("div")
                                    .class("actions")
                                    .rect(0.0, 400.0, 600.0, 60.0)
                                    .child(
                                        MemoryElement::new("button")
                                            .id("pay-btn")
                                            .text("Pay now")
                                            .rect(20.0, 410.0, 120.0, 40.0),
                                    ),
                            ),
                    ),
            ),
        ),
    ))
}

/// Heals `#pay-btn` after its id is gone and an optional
/// `(selector, attribute, value)` change to one of its ancestors.
async fn heal_checkout_by_hierarchy(change: Option<(&str, &str, &str)>) -> ResolutionResult {
    let tree = checkout_page();
    let button = tree.find("#pay-btn").await.unwrap().unwrap();
    let fingerprint = FingerprintBuilder::default()
        .capture(tree.as_ref(), button)
        .await
        .unwrap();
    tree.remove_attribute(button, "id").unwrap();
    if let Some((selector, name, value)) = change {
        let ancestor = tree.find(selector).await.unwrap().unwrap();
        tree.set_attribute(ancestor, name, value).unwrap();
    }

    let orchestrator = only(&tree, Arc::new(HierarchyStrategy::new(3)));
    let result = orchestrator
        .resolve("#pay-btn", &fingerprint, &orchestrator.default_options())
        .await
        .unwrap();
    if result.is_resolved() {
        assert_eq!(result.strategy, "hierarchy");
        assert_eq!(result.element, Some(button));
    }
    result
}

#[tokio::test]
async fn hierarchy_heals_from_deepest_context_down() {
    let deepest = heal_checkout_by_hierarchy(None).await;
    assert_eq!(deepest.selector, "#app section.checkout div.actions button");
    assert!((deepest.confidence - 0.9).abs() < 1e-9);

    let middle = heal_checkout_by_hierarchy(Some(("main", "id", "shell"))).await;
    assert_eq!(middle.selector, "section.checkout div.actions button");
    assert!((middle.confidence - 0.8).abs() < 1e-9);

    let nearest = heal_checkout_by_hierarchy(Some(("section", "class", "cart"))).await;
    assert_eq!(nearest.selector, "div.actions button");
    assert!((nearest.confidence - 0.7).abs() < 1e-9);

    let lost = heal_checkout_by_hierarchy(Some(("div.actions", "class", "toolbar"))).await;
    assert!(!lost.is_resolved());
    assert_eq!(lost.strategy, ResolutionResult::STRATEGY_FAILED);
}

/// Moves the login button (id dropped) and heals it by position alone.
async fn heal_login_by_position(rect: BoundingBox) -> (ResolutionResult, Arc<MemoryTree>) {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let button = tree.find("#login-btn").await.unwrap().unwrap();
    drop_login_id(&tree).await;
    tree.set_rect(button, rect).unwrap();

    let orchestrator = only(&tree, Arc::new(PositionStrategy::new(50.0)));
    let result = orchestrator
        .resolve("#login-btn", &fingerprint, &orchestrator.default_options())
        .await
        .unwrap();
    (result, tree)
}

#[tokio::test]
async fn position_heals_within_tolerance_only() {
    // recorded at (120, 200) sized 100x40
    let (shifted, tree) =
        heal_login_by_position(BoundingBox::new(170.0, 250.0, 150.0, 90.0)).await;
    assert_eq!(shifted.strategy, "position");
    assert_eq!(shifted.confidence, 0.5);
    let element = shifted.element.unwrap();
    assert_eq!(tree.text(element).await.unwrap(), "Sign In");

    let (too_far, _) = heal_login_by_position(BoundingBox::new(171.0, 200.0, 100.0, 40.0)).await;
    assert_eq!(too_far.strategy, ResolutionResult::STRATEGY_FAILED);

    let (too_wide, _) =
        heal_login_by_position(BoundingBox::new(120.0, 200.0, 151.0, 40.0)).await;
    assert_eq!(too_wide.strategy, ResolutionResult::STRATEGY_FAILED);
}

#[tokio::test]
async fn position_requires_the_recorded_tag() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let button = tree.find("#login-btn").await.unwrap().unwrap();
    let form = tree.find("form").await.unwrap().unwrap();
    tree.remove(button).unwrap();
    tree.append(
        form,
        MemoryElement::new("a")
            .text("Sign In")
            .rect(120.0, 200.0, 100.0, 40.0),
    )
    .unwrap();

    let orchestrator = only(&tree, Arc::new(PositionStrategy::new(50.0)));
    let result = orchestrator
        .resolve("#login-btn", &fingerprint, &orchestrator.default_options())
        .await
        .unwrap();
    assert!(!result.is_resolved());
}

#[tokio::test]
async fn fuzzy_heals_with_a_subset_of_the_original() {
    let original = "button#login-btn.primary[type=submit]";
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let button = tree.find("#login-btn").await.unwrap().unwrap();
    tree.set_attribute(button, "id", "user-login-v2").unwrap();

    let orchestrator = only(&tree, Arc::new(FuzzyStrategy));
    let options = orchestrator.default_options();
    let renamed = orchestrator
        .resolve(original, &fingerprint, &options)
        .await
        .unwrap();
    assert_eq!(renamed.strategy, "fuzzy");
    assert_eq!(renamed.selector, "button[id*=\"login\"]");
    assert_eq!(renamed.confidence, 0.4);
    assert_eq!(renamed.element, Some(button));

    tree.remove_attribute(button, "id").unwrap();
    let orchestrator = only(&tree, Arc::new(FuzzyStrategy));
    let dropped = orchestrator
        .resolve(original, &fingerprint, &options)
        .await
        .unwrap();
    assert_eq!(dropped.selector, "button[type=\"submit\"]");
    assert_eq!(dropped.confidence, 0.4);
    assert_eq!(dropped.element, Some(button));
}

#[tokio::test]
async fn tree_analysis_reports_similarity_as_confidence() {
    let tree = login_page();
    let fingerprint = login_fingerprint(&tree).await;
    let button = tree.find("#login-btn").await.unwrap().unwrap();
    drop_login_id(&tree).await;

    let score = similarity(
        &fingerprint,
        &tree.text(button).await.unwrap(),
        &tree.bounding_box(button).await.unwrap(),
        &tree.attributes(button).await.unwrap(),
    );
    // text, position and size unchanged; two of three attributes survive
    assert!((score - 0.9).abs() < 1e-9);

    let orchestrator = only(&tree, Arc::new(TreeAnalysisStrategy::new(0.3)));
    let options = orchestrator.default_options();
    let result = orchestrator
        .resolve("#login-btn", &fingerprint, &options)
        .await
        .unwrap();
    assert_eq!(result.strategy, "tree-analysis");
    assert_eq!(result.element, Some(button));
    assert_eq!(result.confidence, score);

    // the score must exceed the threshold, not merely reach it
    let orchestrator = only(&tree, Arc::new(TreeAnalysisStrategy::new(score)));
    let result = orchestrator
        .resolve("#login-btn", &fingerprint, &options)
        .await
        .unwrap();
    assert!(!result.is_resolved());
}

//! Resolution orchestrator: original selector, recorded alternates, then the
//! healing cascade.

use std::sync::Arc;
use std::time::Instant;

use element_tree::ElementTree;
use locator_core_types::{ElementHandle, IdSource, SequentialIdSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ResolutionCache;
use crate::config::{LocatorConfig, ResolverSettings};
use crate::errors::LocatorError;
use crate::generator::CandidateGenerator;
use crate::healer::HealingHistory;
use crate::registry::StrategyRegistry;
use crate::stability::StabilityEvaluator;
use crate::strategies::{HealContext, StrategyMatch};
use crate::types::{
    ElementFingerprint, ElementLocator, ResolutionMetadata, ResolutionResult, ResolveOptions,
};
use crate::wait::{cancellable_sleep, wait_for_element, WaitOutcome};

/// Resolves recorded selectors against one element tree.
///
/// Each orchestrator owns its cache and healing history; nothing is shared
/// between instances.
pub struct ResolutionOrchestrator {
    tree: Arc<dyn ElementTree>,
    registry: StrategyRegistry,
    generator: CandidateGenerator,
    stability: StabilityEvaluator,
    cache: ResolutionCache,
    history: HealingHistory,
    ids: Arc<dyn IdSource>,
    settings: ResolverSettings,
    max_alternatives: usize,
    cancel: CancellationToken,
}

/// Where a successful resolution came from.
struct Hit {
    selector: String,
    element: ElementHandle,
    confidence: f64,
    strategy: String,
    healed: bool,
}

impl ResolutionOrchestrator {
    pub fn new(tree: Arc<dyn ElementTree>, config: &LocatorConfig) -> Self {
        let ids: Arc<dyn IdSource> = Arc::new(SequentialIdSource::default());
        Self {
            tree,
            registry: StrategyRegistry::with_defaults(&config.strategies),
            generator: CandidateGenerator::new(config.selector.clone()),
            stability: StabilityEvaluator::new(),
            cache: ResolutionCache::new(config.resolver.cache_ttl()),
            history: HealingHistory::new(ids.clone()),
            ids,
            settings: config.resolver.clone(),
            max_alternatives: config.selector.max_alternatives,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the id source for results and heal records.
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.history = HealingHistory::new(ids.clone());
        self.ids = ids;
        self
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.registry
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Token that aborts every in-flight and future resolution of this
    /// orchestrator.
    pub fn abort_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn default_options(&self) -> ResolveOptions {
        ResolveOptions::from_settings(&self.settings)
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn history(&self) -> &HealingHistory {
        &self.history
    }

    pub fn generator(&self) -> &CandidateGenerator {
        &self.generator
    }

    pub fn tree(&self) -> &Arc<dyn ElementTree> {
        &self.tree
    }

    pub async fn evaluate_selector_stability(
        &self,
        selector: &str,
        element: ElementHandle,
    ) -> f64 {
        self.stability
            .evaluate(self.tree.as_ref(), selector, element)
            .await
    }

    /// Resolves `original` to a live element.
    ///
    /// Exhaustion is not an error: the result then has no element, confidence
    /// 0 and strategy `failed`. Only cancellation is reported as `Err`.
    pub async fn resolve(
        &self,
        original: &str,
        fingerprint: &ElementFingerprint,
        options: &ResolveOptions,
    ) -> Result<ResolutionResult, LocatorError> {
        let started = Instant::now();
        let options_hash = options.cache_hash();

        if self.settings.cache_enabled {
            if let Some(result) = self.revalidate_cached(original, options_hash, fingerprint).await
            {
                debug!("Cache hit for '{}' -> '{}'", original, result.selector);
                return Ok(ResolutionResult {
                    metadata: ResolutionMetadata {
                        from_cache: true,
                        time_taken_ms: elapsed_ms(started),
                        ..result.metadata
                    },
                    ..result
                });
            }
        }

        let mut attempts = 0u32;
        let hit = match self.try_recorded(original, options, &mut attempts).await? {
            Some(hit) => Some(hit),
            None => self.heal(original, fingerprint, options, &mut attempts).await?,
        };

        let result = match hit {
            Some(hit) => {
                let result = ResolutionResult {
                    id: self.ids.next_id("res"),
                    alternatives: other_selectors(original, options, &hit.selector),
                    metadata: ResolutionMetadata {
                        attempts,
                        healing_applied: hit.healed,
                        fallback_used: hit.strategy != ResolutionResult::STRATEGY_ORIGINAL,
                        time_taken_ms: elapsed_ms(started),
                        from_cache: false,
                    },
                    selector: hit.selector,
                    element: Some(hit.element),
                    confidence: hit.confidence,
                    strategy: hit.strategy,
                };
                info!(
                    "Resolved '{}' via {} -> '{}' (confidence: {:.2}, attempts: {})",
                    original, result.strategy, result.selector, result.confidence, attempts
                );
                if self.settings.cache_enabled {
                    self.cache.put(original, options_hash, result.clone());
                }
                result
            }
            None => {
                warn!(
                    "Could not resolve '{}' after {} attempts",
                    original, attempts
                );
                ResolutionResult {
                    id: self.ids.next_id("res"),
                    selector: original.to_string(),
                    element: None,
                    confidence: 0.0,
                    strategy: ResolutionResult::STRATEGY_FAILED.to_string(),
                    alternatives: other_selectors(original, options, original),
                    metadata: ResolutionMetadata {
                        attempts,
                        healing_applied: false,
                        fallback_used: false,
                        time_taken_ms: elapsed_ms(started),
                        from_cache: false,
                    },
                }
            }
        };
        Ok(result)
    }

    /// Resolves the locator's primary with its alternates and, when self-heal
    /// is on, commits a heal to the locator.
    pub async fn resolve_locator(
        &self,
        locator: &mut ElementLocator,
    ) -> Result<ResolutionResult, LocatorError> {
        let options = self
            .default_options()
            .with_alternatives(locator.alternative_selectors.clone());
        let original = locator.primary_selector.clone();
        let result = self
            .resolve(&original, &locator.fingerprint, &options)
            .await?;
        if self.settings.self_heal
            && result.metadata.healing_applied
            && locator.apply_heal(&result.selector, self.max_alternatives)
        {
            info!(
                "Locator primary '{}' replaced by '{}'",
                original, locator.primary_selector
            );
        }
        Ok(result)
    }

    /// Cached result whose selector still finds an element of the recorded
    /// tag; stale entries are evicted.
    async fn revalidate_cached(
        &self,
        original: &str,
        options_hash: u64,
        fingerprint: &ElementFingerprint,
    ) -> Option<ResolutionResult> {
        let cached = self.cache.get(original, options_hash)?;
        let element = match self.tree.find(&cached.selector).await {
            Ok(Some(element)) => element,
            Ok(None) | Err(_) => {
                self.evict_stale(original, options_hash, &cached);
                return None;
            }
        };
        match self.tree.tag_name(element).await {
            Ok(tag) if tag.eq_ignore_ascii_case(&fingerprint.tag_name) => Some(ResolutionResult {
                element: Some(element),
                ..cached
            }),
            _ => {
                self.evict_stale(original, options_hash, &cached);
                None
            }
        }
    }

    fn evict_stale(&self, original: &str, options_hash: u64, cached: &ResolutionResult) {
        if self
            .cache
            .evict_if_current(original, options_hash, &cached.id)
        {
            warn!(
                "Evicted stale cache entry for '{}' ('{}' no longer resolves)",
                original, cached.selector
            );
        }
    }

    /// Original selector, then alternates in recorded order.
    async fn try_recorded(
        &self,
        original: &str,
        options: &ResolveOptions,
        attempts: &mut u32,
    ) -> Result<Option<Hit>, LocatorError> {
        *attempts += 1;
        if let Some(element) = self
            .wait(original, options.original_timeout(), options)
            .await?
        {
            return Ok(Some(Hit {
                selector: original.to_string(),
                element,
                confidence: 1.0,
                strategy: ResolutionResult::STRATEGY_ORIGINAL.to_string(),
                healed: false,
            }));
        }

        for alternative in &options.alternative_selectors {
            if alternative == original {
                continue;
            }
            *attempts += 1;
            if let Some(element) = self
                .wait(alternative, options.alternative_timeout(), options)
                .await?
            {
                return Ok(Some(Hit {
                    selector: alternative.clone(),
                    element,
                    confidence: 0.8,
                    strategy: ResolutionResult::STRATEGY_ALTERNATIVE.to_string(),
                    healed: false,
                }));
            }
        }
        Ok(None)
    }

    async fn wait(
        &self,
        selector: &str,
        timeout: std::time::Duration,
        options: &ResolveOptions,
    ) -> Result<Option<ElementHandle>, LocatorError> {
        let outcome = wait_for_element(
            self.tree.as_ref(),
            selector,
            timeout,
            options.poll_interval(),
            &self.cancel,
        )
        .await?;
        Ok(match outcome {
            WaitOutcome::Found(element) => Some(element),
            WaitOutcome::TimedOut => {
                debug!("'{}' not found within {:?}", selector, timeout);
                None
            }
            WaitOutcome::Invalid(err) => {
                debug!("Skipping '{}': {}", selector, err);
                None
            }
        })
    }

    /// Strategy cascade, repeated up to `max_retries` rounds with growing
    /// backoff between rounds.
    async fn heal(
        &self,
        original: &str,
        fingerprint: &ElementFingerprint,
        options: &ResolveOptions,
        attempts: &mut u32,
    ) -> Result<Option<Hit>, LocatorError> {
        let ctx = HealContext {
            tree: self.tree.as_ref(),
            fingerprint,
            original_selector: original,
            generator: &self.generator,
        };
        let strategies = self.registry.ordered();

        for retry in 0..options.max_retries {
            if self.cancel.is_cancelled() {
                return Err(LocatorError::Cancelled);
            }
            for strategy in &strategies {
                if self.cancel.is_cancelled() {
                    return Err(LocatorError::Cancelled);
                }
                *attempts += 1;
                debug!(
                    "Healing '{}' with {} (round {})",
                    original,
                    strategy.name(),
                    retry + 1
                );
                if let Some(StrategyMatch {
                    selector,
                    element,
                    confidence,
                }) = strategy.attempt(&ctx).await
                {
                    self.history
                        .record(original, &selector, strategy.name(), confidence);
                    return Ok(Some(Hit {
                        selector,
                        element,
                        confidence,
                        strategy: strategy.name().to_string(),
                        healed: true,
                    }));
                }
            }
            if retry + 1 < options.max_retries {
                let backoff = options.backoff(retry);
                debug!(
                    "No strategy healed '{}'; retrying in {:?}",
                    original, backoff
                );
                cancellable_sleep(backoff, &self.cancel).await?;
            }
        }
        Ok(None)
    }
}

/// Original plus alternates, minus the selector that won.
fn other_selectors(original: &str, options: &ResolveOptions, chosen: &str) -> Vec<String> {
    let mut others: Vec<String> = Vec::new();
    let recorded = options.alternative_selectors.iter().map(String::as_str);
    for selector in std::iter::once(original).chain(recorded) {
        if selector != chosen && !others.iter().any(|s| s == selector) {
            others.push(selector.to_string());
        }
    }
    others
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

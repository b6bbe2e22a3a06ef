//! Element locator and self-heal
//!
//! Generates ranked selector candidates for elements of an [`ElementTree`],
//! scores selector stability, and resolves recorded selectors on later runs
//! through recorded alternates and a prioritized healing cascade.
//!
//! [`ElementTree`]: element_tree::ElementTree

pub mod cache;
pub mod config;
pub mod errors;
pub mod escape;
pub mod fingerprint;
pub mod generator;
pub mod healer;
pub mod heuristics;
pub mod registry;
pub mod resolver;
pub mod scoring;
pub mod stability;
pub mod strategies;
pub mod types;
pub mod wait;

pub use cache::{CacheStats, ResolutionCache};
pub use config::{
    load_config, load_config_with_options, LoadOptions, LocatorConfig, ResolverSettings,
    SelectorOptions, StrategySettings,
};
pub use errors::LocatorError;
pub use fingerprint::FingerprintBuilder;
pub use generator::CandidateGenerator;
pub use healer::{HealRecord, HealingHistory};
pub use registry::StrategyRegistry;
pub use resolver::ResolutionOrchestrator;
pub use stability::StabilityEvaluator;
pub use strategies::{HealContext, HealingStrategy, StrategyMatch};
pub use types::*;
pub use wait::{wait_for_element, WaitOutcome};
